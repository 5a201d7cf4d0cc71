//! Storage collaborator.
//!
//! The core only talks to persistence through these traits. `PgStore` is the
//! production implementation; `MemoryStore` backs tests and local runs.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::auth::{NewUser, Permission, RefreshToken, Role, User, UserWithPassword};
use crate::models::task::{Task, TaskFilter};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// User rows.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a live (not soft-deleted) user whose username OR email equals `login`.
    async fn find_user_by_login(&self, login: &str)
    -> Result<Option<UserWithPassword>, StoreError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn username_or_email_taken(&self, username: &str, email: &str)
    -> Result<bool, StoreError>;

    /// Insert a user. Fails with `Conflict` on a duplicate username or email.
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

    /// Insert a user and assign `role_id` in one transaction. Nothing is
    /// written if either step fails.
    async fn create_user_with_role(&self, user: NewUser, role_id: Uuid)
    -> Result<User, StoreError>;

    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Soft-delete a user. Returns whether a live row was affected.
    async fn soft_delete_user(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// Roles, permissions and their join tables.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError>;

    /// Roles assigned to a user, in assignment-fetch order.
    async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<Role>, StoreError>;

    /// Every permission assigned to any of `role_ids`; duplicates are possible.
    async fn permissions_for_roles(&self, role_ids: &[Uuid])
    -> Result<Vec<Permission>, StoreError>;

    async fn create_role(&self, name: &str) -> Result<Role, StoreError>;

    async fn create_permission(&self, resource: &str, action: &str)
    -> Result<Permission, StoreError>;

    async fn grant_permission(&self, role_id: Uuid, permission_id: Uuid)
    -> Result<(), StoreError>;

    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> Result<(), StoreError>;

    async fn role_count(&self) -> Result<i64, StoreError>;
}

/// Server-side refresh token rows, keyed by the SHA-256 digest of the token value.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert_refresh_token(&self, token: &RefreshToken) -> Result<(), StoreError>;

    /// Find a token row with `expires_at > now`.
    async fn find_valid_refresh_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>, StoreError>;

    /// Atomically delete the row for `token_hash`, returning rows affected.
    async fn delete_refresh_token(&self, token_hash: &str) -> Result<u64, StoreError>;

    /// Delete every row with `expires_at <= now`, returning rows affected.
    async fn delete_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Delete every row owned by `user_id`, returning rows affected.
    async fn delete_refresh_tokens_for_user(&self, user_id: Uuid) -> Result<u64, StoreError>;

    async fn refresh_token_count(&self) -> Result<i64, StoreError>;
}

/// Task rows.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert_task(&self, task: &Task) -> Result<(), StoreError>;

    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, StoreError>;

    /// Persist the mutable fields (title, description, status, priority, updated_at).
    async fn update_task(&self, task: &Task) -> Result<(), StoreError>;

    async fn delete_task(&self, id: Uuid) -> Result<u64, StoreError>;

    /// One page of tasks matching `filter`, plus the total match count.
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<(Vec<Task>, i64), StoreError>;

    /// Every task owned by `user_id`, newest first.
    async fn tasks_for_user(&self, user_id: Uuid) -> Result<Vec<Task>, StoreError>;
}

/// The full storage surface.
pub trait Store: UserStore + RoleStore + RefreshTokenStore + TaskStore {}

impl<T> Store for T where T: UserStore + RoleStore + RefreshTokenStore + TaskStore {}
