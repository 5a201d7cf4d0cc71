//! Authentication domain models.
//!
//! These are internal domain models, distinct from the HTTP request/response
//! shapes in `taskify_api::models`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the privileged role.
pub const ADMIN_ROLE: &str = "admin";

/// Name of the role granted to every newly registered user.
pub const DEFAULT_ROLE: &str = "user";

/// Domain user. The password hash never leaves the store layer through this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User with password hash (for internal auth flows).
#[derive(Debug, Clone)]
pub struct UserWithPassword {
    pub user: User,
    pub password_hash: String,
}

/// Input for creating a user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// A named role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
}

/// A `(resource, action)` pair, e.g. `(task, create)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: Uuid,
    pub resource: String,
    pub action: String,
}

/// Resource → set of allowed actions.
pub type PermissionMap = BTreeMap<String, BTreeSet<String>>;

/// Refresh token record stored in the database.
///
/// Only the SHA-256 digest of the opaque token value is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// JWT claims embedded in access tokens.
///
/// A snapshot of the user's roles and permissions at issuance time; it is
/// trusted for the whole token lifetime and never re-checked against storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub user_id: Uuid,
    pub username: String,
    pub roles: Vec<String>,
    pub is_admin: bool,
    pub permissions: PermissionMap,
    /// Subject: user ID as a string (standard JWT `sub` claim).
    pub sub: String,
    /// Issuer.
    pub iss: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Not before (unix timestamp).
    pub nbf: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

impl AccessClaims {
    /// Whether the embedded permission snapshot grants `action` on `resource`.
    pub fn allows(&self, resource: &str, action: &str) -> bool {
        self.permissions
            .get(resource)
            .is_some_and(|actions| actions.contains(action))
    }
}

/// Access + refresh token pair handed to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}
