//! JWT access token signing and verification (HS256).
//!
//! Signing and verification are pure functions over immutable keys, safe to
//! call concurrently from any number of requests.

use std::fmt;
use std::path::PathBuf;

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::AccessClaims;
use crate::models::auth::PermissionMap;

/// Access token lifetime: 1 hour.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;

/// `iss` claim stamped into and required from every access token.
pub const ISSUER: &str = "taskify";

/// HMAC key pair derived from the shared secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JwtKeys(..)")
    }
}

impl JwtKeys {
    /// Build keys from secret bytes. An empty secret is a signing fault.
    pub fn from_secret(secret: &[u8]) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::Signing("signing key is empty".into()));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        })
    }
}

/// Build fresh claims for a user, valid from now for `ACCESS_TOKEN_TTL_SECS`.
pub fn build_claims(
    user_id: Uuid,
    username: &str,
    roles: Vec<String>,
    is_admin: bool,
    permissions: PermissionMap,
) -> AccessClaims {
    let now = Utc::now();
    AccessClaims {
        user_id,
        username: username.to_string(),
        roles,
        is_admin,
        permissions,
        sub: user_id.to_string(),
        iss: ISSUER.to_string(),
        iat: now.timestamp(),
        nbf: now.timestamp(),
        exp: (now + Duration::seconds(ACCESS_TOKEN_TTL_SECS)).timestamp(),
    }
}

/// Sign claims into a compact `header.claims.signature` token.
pub fn sign_access_token(claims: &AccessClaims, keys: &JwtKeys) -> Result<String, AuthError> {
    encode(&Header::new(Algorithm::HS256), claims, &keys.encoding)
        .map_err(|e| AuthError::Signing(format!("jwt encode: {e}")))
}

/// Verify signature, algorithm, issuer, `nbf` and `exp`, returning the claims.
pub fn verify_access_token(token: &str, keys: &JwtKeys) -> Result<AccessClaims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.set_issuer(&[ISSUER]);
    validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);
    decode::<AccessClaims>(token, &keys.decoding, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            debug!(error = %e, "access token rejected");
            AuthError::InvalidToken
        })
}

/// Resolve the JWT secret: env var `JWT_SECRET` → `AUTH_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    for var in ["JWT_SECRET", "AUTH_SECRET"] {
        if let Ok(secret) = std::env::var(var)
            && !secret.is_empty()
        {
            return secret;
        }
    }
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match std::fs::write(&secret_path, &secret) {
        Ok(()) => info!(path = %secret_path.display(), "generated new JWT secret"),
        Err(e) => warn!(path = %secret_path.display(), error = %e, "could not persist JWT secret"),
    }
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskify")
        .join("jwt-secret")
}
