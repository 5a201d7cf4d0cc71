//! API server configuration.

use std::time::Duration;

use taskify_core::auth::jwt::resolve_jwt_secret;
use taskify_core::rate_limit::RateLimitConfig;

/// Default cache budget: 64 MiB of cost units.
pub const DEFAULT_CACHE_CAPACITY_BYTES: u64 = 64 * 1024 * 1024;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:8080").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Total cost budget of the entity cache.
    pub cache_capacity_bytes: u64,
    pub general_rate_per_sec: f64,
    pub general_burst: u32,
    pub auth_rate_per_sec: f64,
    pub auth_burst: u32,
    /// Rate-limit buckets idle for this many seconds are purged.
    pub rate_limit_idle_secs: u64,
    /// Period of the background sweepers.
    pub sweep_interval_secs: u64,
    /// Password for the bootstrap `admin` account; none means no bootstrap admin.
    pub bootstrap_admin_password: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let general = RateLimitConfig::general();
        let auth = RateLimitConfig::auth();
        Self {
            bind_addr: "127.0.0.1:8080".into(),
            database_url: "postgres://localhost:5432/taskify".into(),
            jwt_secret: String::new(),
            cache_capacity_bytes: DEFAULT_CACHE_CAPACITY_BYTES,
            general_rate_per_sec: general.rate_per_sec,
            general_burst: general.burst,
            auth_rate_per_sec: auth.rate_per_sec,
            auth_burst: auth.burst,
            rate_limit_idle_secs: general.idle_timeout.as_secs(),
            sweep_interval_secs: 60,
            bootstrap_admin_password: None,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                   | Default                                |
    /// |----------------------------|----------------------------------------|
    /// | `BIND_ADDR`                | `127.0.0.1:8080`                       |
    /// | `DATABASE_URL`             | `postgres://localhost:5432/taskify`    |
    /// | `JWT_SECRET` / `AUTH_SECRET` | generated & persisted to file        |
    /// | `CACHE_CAPACITY_BYTES`     | `67108864`                             |
    /// | `RATE_LIMIT_RPS` / `RATE_LIMIT_BURST` | `1` / `10`                  |
    /// | `AUTH_RATE_LIMIT_RPS` / `AUTH_RATE_LIMIT_BURST` | `0.5` / `3`       |
    /// | `RATE_LIMIT_IDLE_SECS`     | `180`                                  |
    /// | `SWEEP_INTERVAL_SECS`      | `60`                                   |
    /// | `BOOTSTRAP_ADMIN_PASSWORD` | unset                                  |
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            bind_addr: env_or("BIND_ADDR", d.bind_addr),
            database_url: env_or("DATABASE_URL", d.database_url),
            jwt_secret: resolve_jwt_secret(),
            cache_capacity_bytes: env_or("CACHE_CAPACITY_BYTES", d.cache_capacity_bytes),
            general_rate_per_sec: env_or("RATE_LIMIT_RPS", d.general_rate_per_sec),
            general_burst: env_or("RATE_LIMIT_BURST", d.general_burst),
            auth_rate_per_sec: env_or("AUTH_RATE_LIMIT_RPS", d.auth_rate_per_sec),
            auth_burst: env_or("AUTH_RATE_LIMIT_BURST", d.auth_burst),
            rate_limit_idle_secs: env_or("RATE_LIMIT_IDLE_SECS", d.rate_limit_idle_secs),
            sweep_interval_secs: env_or("SWEEP_INTERVAL_SECS", d.sweep_interval_secs),
            bootstrap_admin_password: std::env::var("BOOTSTRAP_ADMIN_PASSWORD")
                .ok()
                .filter(|p| !p.is_empty()),
        }
    }

    pub fn general_rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            rate_per_sec: self.general_rate_per_sec,
            burst: self.general_burst,
            idle_timeout: Duration::from_secs(self.rate_limit_idle_secs),
        }
    }

    pub fn auth_rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            rate_per_sec: self.auth_rate_per_sec,
            burst: self.auth_burst,
            idle_timeout: Duration::from_secs(self.rate_limit_idle_secs),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}
