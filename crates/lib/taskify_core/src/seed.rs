//! Default roles, permissions and the optional bootstrap admin.

use thiserror::Error;
use tracing::info;

use crate::auth::password::hash_password;
use crate::models::auth::{ADMIN_ROLE, DEFAULT_ROLE, NewUser};
use crate::store::{Store, StoreError};

/// Every permission the API checks, as (resource, action).
pub const PERMISSIONS: &[(&str, &str)] = &[
    ("profile", "read"),
    ("profile", "write"),
    ("task", "create"),
    ("task", "read"),
    ("task", "write"),
    ("task", "delete"),
    ("user", "read"),
    ("user", "delete"),
];

/// Permissions granted to the default role.
pub const DEFAULT_ROLE_PERMISSIONS: &[(&str, &str)] = &[
    ("profile", "read"),
    ("task", "create"),
    ("task", "read"),
    ("task", "write"),
    ("task", "delete"),
];

const BOOTSTRAP_ADMIN_USERNAME: &str = "admin";
const BOOTSTRAP_ADMIN_EMAIL: &str = "admin@localhost";

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Hashing error: {0}")]
    Hashing(String),
}

#[derive(Debug, Clone, Default)]
pub struct SeedOptions {
    /// When set, create `admin` / `admin@localhost` with this password.
    pub admin_password: Option<String>,
}

/// Seed roles and permissions if no role exists yet, then the bootstrap admin
/// if requested and absent. Safe to call on every startup.
pub async fn seed_defaults<S>(store: &S, options: &SeedOptions) -> Result<(), SeedError>
where
    S: Store + ?Sized,
{
    if store.role_count().await? == 0 {
        let user_role = store.create_role(DEFAULT_ROLE).await?;
        let admin_role = store.create_role(ADMIN_ROLE).await?;
        for &(resource, action) in PERMISSIONS {
            let permission = store.create_permission(resource, action).await?;
            store.grant_permission(admin_role.id, permission.id).await?;
            if DEFAULT_ROLE_PERMISSIONS.contains(&(resource, action)) {
                store.grant_permission(user_role.id, permission.id).await?;
            }
        }
        info!(permissions = PERMISSIONS.len(), "seeded default roles");
    }

    if let Some(password) = &options.admin_password {
        seed_admin(store, password).await?;
    }
    Ok(())
}

async fn seed_admin<S>(store: &S, password: &str) -> Result<(), SeedError>
where
    S: Store + ?Sized,
{
    if store
        .username_or_email_taken(BOOTSTRAP_ADMIN_USERNAME, BOOTSTRAP_ADMIN_EMAIL)
        .await?
    {
        return Ok(());
    }
    let role = store
        .find_role_by_name(ADMIN_ROLE)
        .await?
        .ok_or_else(|| StoreError::Internal("admin role missing".into()))?;
    let password_hash = hash_password(password).map_err(|e| SeedError::Hashing(e.to_string()))?;
    let admin = store
        .create_user_with_role(
            NewUser {
                username: BOOTSTRAP_ADMIN_USERNAME.into(),
                email: BOOTSTRAP_ADMIN_EMAIL.into(),
                password_hash,
            },
            role.id,
        )
        .await?;
    info!(user_id = %admin.id, "created bootstrap admin");
    Ok(())
}
