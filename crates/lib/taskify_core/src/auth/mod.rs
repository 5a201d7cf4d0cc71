//! Authentication and authorization logic.
//!
//! Password hashing, permission resolution, access-token signing, refresh-token
//! rotation and the request guard checks. Storage is reached through the
//! `crate::store` traits only.

pub mod guard;
pub mod jwt;
pub mod password;
pub mod permissions;
pub mod refresh;
pub mod service;
pub mod tokens;

use thiserror::Error;

use crate::store::StoreError;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Malformed token")]
    MalformedToken,

    #[error("Invalid or expired refresh token")]
    RefreshTokenNotFound,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Hashing error: {0}")]
    Hashing(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Lookup error: {0}")]
    Lookup(StoreError),

    #[error("Persistence error: {0}")]
    Persistence(StoreError),
}
