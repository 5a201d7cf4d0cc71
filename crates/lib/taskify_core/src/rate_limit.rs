//! Per-client token-bucket rate limiting.
//!
//! Each client key gets an independent bucket, created on first use under the
//! map's shard lock so concurrent first requests share a single bucket. Idle
//! buckets are dropped by `purge_idle`; a purged client starts again with a
//! full bucket.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Rate and burst for one limiter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    /// Tokens added per second.
    pub rate_per_sec: f64,
    /// Bucket capacity; a new bucket starts full.
    pub burst: u32,
    /// Buckets untouched for this long are purged.
    pub idle_timeout: Duration,
}

impl RateLimitConfig {
    /// General API limiter: 1 req/s, burst 10.
    pub fn general() -> Self {
        Self {
            rate_per_sec: 1.0,
            burst: 10,
            idle_timeout: Duration::from_secs(180),
        }
    }

    /// Authentication endpoints: 1 req per 2 s, burst 3.
    pub fn auth() -> Self {
        Self {
            rate_per_sec: 0.5,
            burst: 3,
            idle_timeout: Duration::from_secs(180),
        }
    }
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl TokenBucket {
    fn full(capacity: u32, now: Instant) -> Self {
        Self {
            tokens: f64::from(capacity),
            last_refill: now,
            last_seen: now,
        }
    }

    fn try_consume(&mut self, config: &RateLimitConfig, now: Instant) -> bool {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * config.rate_per_sec).min(f64::from(config.burst));
        self.last_refill = now;
        self.last_seen = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Token-bucket limiter keyed by client address.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: DashMap<String, TokenBucket>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
        }
    }

    /// Consume one token for `client`. Returns false when throttled.
    pub fn allow(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut bucket = self
            .buckets
            .entry(client.to_string())
            .or_insert_with(|| TokenBucket::full(self.config.burst, now));
        bucket.try_consume(&self.config, now)
    }

    /// Drop buckets idle for longer than the configured timeout.
    pub fn purge_idle(&self) -> usize {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets
            .retain(|_, b| now.duration_since(b.last_seen) <= self.config.idle_timeout);
        before.saturating_sub(self.buckets.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    /// Purge idle buckets every `period` until `cancel` fires.
    pub async fn run_sweeper(self: Arc<Self>, period: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("rate limit sweeper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let purged = self.purge_idle();
                    if purged > 0 {
                        debug!(
                            purged,
                            remaining = self.tracked_clients(),
                            "purged idle rate limit buckets"
                        );
                    }
                }
            }
        }
    }
}
