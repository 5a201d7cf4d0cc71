//! Refresh token validation and single-use invalidation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::AuthError;
use super::tokens::{hash_refresh_token, is_well_formed_refresh_token};
use crate::models::auth::RefreshToken;
use crate::store::Store;

/// Validates and consumes refresh tokens.
#[derive(Clone)]
pub struct RefreshRotator {
    store: Arc<dyn Store>,
}

impl RefreshRotator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Look up a live (unexpired, unconsumed) refresh token.
    pub async fn validate(&self, token: &str) -> Result<RefreshToken, AuthError> {
        if !is_well_formed_refresh_token(token) {
            return Err(AuthError::MalformedToken);
        }
        self.store
            .find_valid_refresh_token(&hash_refresh_token(token), Utc::now())
            .await
            .map_err(AuthError::Lookup)?
            .ok_or(AuthError::RefreshTokenNotFound)
    }

    /// Delete the row for `token`. Idempotent: returns whether this call removed it.
    pub async fn invalidate(&self, token: &str) -> Result<bool, AuthError> {
        let removed = self
            .store
            .delete_refresh_token(&hash_refresh_token(token))
            .await
            .map_err(AuthError::Persistence)?;
        Ok(removed > 0)
    }

    /// Delete every expired refresh token row.
    pub async fn reap_expired(&self) -> Result<u64, AuthError> {
        self.store
            .delete_expired_refresh_tokens(Utc::now())
            .await
            .map_err(AuthError::Persistence)
    }

    /// Run `reap_expired` every `period` until `cancel` fires.
    pub async fn run_reaper(self, period: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("refresh token reaper stopped");
                    return;
                }
                _ = ticker.tick() => match self.reap_expired().await {
                    Ok(0) => {}
                    Ok(n) => info!(removed = n, "reaped expired refresh tokens"),
                    Err(e) => warn!(error = %e, "refresh token reap failed"),
                },
            }
        }
    }
}
