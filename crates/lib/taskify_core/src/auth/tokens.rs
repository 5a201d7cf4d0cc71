//! Token pair issuance: signed access token + persisted opaque refresh token.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

use super::AuthError;
use super::jwt::{ACCESS_TOKEN_TTL_SECS, JwtKeys, build_claims, sign_access_token};
use super::permissions::PermissionResolver;
use crate::models::auth::{RefreshToken, TokenPair};
use crate::store::Store;
use crate::uuid::uuidv7;

/// Refresh token lifetime: 1 hour.
pub const REFRESH_TOKEN_TTL_SECS: i64 = 60 * 60;

/// Length of an opaque refresh token value (alphanumeric chars, ~380 bits).
pub const REFRESH_TOKEN_LEN: usize = 64;

/// Generate a cryptographically random refresh token value.
pub fn generate_refresh_token() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(REFRESH_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// SHA-256 hash a refresh token value for storage.
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Structural check: exactly `REFRESH_TOKEN_LEN` ASCII alphanumerics.
pub fn is_well_formed_refresh_token(token: &str) -> bool {
    token.len() == REFRESH_TOKEN_LEN && token.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Mints access/refresh token pairs.
#[derive(Clone)]
pub struct TokenIssuer {
    store: Arc<dyn Store>,
    resolver: PermissionResolver,
    keys: JwtKeys,
}

impl TokenIssuer {
    pub fn new(store: Arc<dyn Store>, keys: JwtKeys) -> Self {
        Self {
            resolver: PermissionResolver::new(store.clone()),
            store,
            keys,
        }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    /// Issue a fresh pair for `user_id`.
    ///
    /// All-or-nothing: if the refresh token row cannot be written, no token is
    /// returned at all.
    pub async fn issue_token_pair(&self, user_id: Uuid) -> Result<TokenPair, AuthError> {
        let resolved = self.resolver.resolve(user_id).await?;

        let user = self
            .store
            .find_user(user_id)
            .await
            .map_err(AuthError::Lookup)?
            .ok_or_else(|| AuthError::NotFound(format!("user {user_id}")))?;

        let claims = build_claims(
            user_id,
            &user.username,
            resolved.roles,
            resolved.is_admin,
            resolved.permissions,
        );
        let access_token = sign_access_token(&claims, &self.keys)?;

        let refresh_token = generate_refresh_token();
        let record = RefreshToken {
            id: uuidv7(),
            user_id,
            token_hash: hash_refresh_token(&refresh_token),
            expires_at: Utc::now() + Duration::seconds(REFRESH_TOKEN_TTL_SECS),
        };
        if let Err(e) = self.store.insert_refresh_token(&record).await {
            warn!(%user_id, error = %e, "refresh token write failed, discarding token pair");
            return Err(AuthError::Persistence(e));
        }

        debug!(%user_id, is_admin = claims.is_admin, "issued token pair");
        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: ACCESS_TOKEN_TTL_SECS,
        })
    }
}
