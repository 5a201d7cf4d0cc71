//! User profile and administration operations.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::cache::EntityCache;
use crate::models::auth::{AccessClaims, User};
use crate::store::{Store, StoreError};

/// User errors.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    cache: EntityCache,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>, cache: EntityCache) -> Self {
        Self { store, cache }
    }

    /// A user's profile, read-through the cache. Self or admin only.
    pub async fn profile(&self, actor: &AccessClaims, user_id: Uuid) -> Result<User, UserError> {
        if !actor.is_admin && actor.user_id != user_id {
            return Err(UserError::Forbidden(
                "cannot view another user's profile".into(),
            ));
        }
        if let Some(user) = self.cache.get_user_profile(user_id).await {
            return Ok(user);
        }
        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or(UserError::NotFound)?;
        self.cache.set_user_profile(&user).await;
        Ok(user)
    }

    pub async fn list(&self, actor: &AccessClaims) -> Result<Vec<User>, UserError> {
        require_admin(actor)?;
        Ok(self.store.list_users().await?)
    }

    /// Soft-delete a user, revoke their refresh tokens and drop their cached entries.
    pub async fn delete(&self, actor: &AccessClaims, user_id: Uuid) -> Result<(), UserError> {
        require_admin(actor)?;
        if !self.store.soft_delete_user(user_id).await? {
            return Err(UserError::NotFound);
        }
        let revoked = self.store.delete_refresh_tokens_for_user(user_id).await?;
        self.cache.invalidate_user(user_id).await;
        info!(%user_id, deleted_by = %actor.user_id, revoked, "user deleted");
        Ok(())
    }
}

fn require_admin(actor: &AccessClaims) -> Result<(), UserError> {
    if actor.is_admin {
        Ok(())
    } else {
        Err(UserError::Forbidden("admin access required".into()))
    }
}
