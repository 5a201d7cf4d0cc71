//! Role and permission resolution.

use std::sync::Arc;

use uuid::Uuid;

use super::AuthError;
use crate::models::auth::{ADMIN_ROLE, PermissionMap};
use crate::store::Store;

/// A user's roles and grouped permissions, as resolved at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPermissions {
    /// Role names in assignment-fetch order. Callers must not rely on the order.
    pub roles: Vec<String>,
    pub is_admin: bool,
    pub permissions: PermissionMap,
}

/// Derives roles, admin flag and the resource → actions map from role assignments.
#[derive(Clone)]
pub struct PermissionResolver {
    store: Arc<dyn Store>,
}

impl PermissionResolver {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Resolve a user's roles and permissions. Zero roles is not an error.
    pub async fn resolve(&self, user_id: Uuid) -> Result<ResolvedPermissions, AuthError> {
        let roles = self
            .store
            .roles_for_user(user_id)
            .await
            .map_err(AuthError::Lookup)?;
        if roles.is_empty() {
            return Ok(ResolvedPermissions::default());
        }

        let role_ids: Vec<Uuid> = roles.iter().map(|r| r.id).collect();
        let assigned = self
            .store
            .permissions_for_roles(&role_ids)
            .await
            .map_err(AuthError::Lookup)?;

        let mut permissions = PermissionMap::new();
        for p in assigned {
            permissions.entry(p.resource).or_default().insert(p.action);
        }

        let is_admin = roles.iter().any(|r| r.name == ADMIN_ROLE);
        Ok(ResolvedPermissions {
            roles: roles.into_iter().map(|r| r.name).collect(),
            is_admin,
            permissions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::NewUser;
    use crate::seed::{seed_defaults, SeedOptions};
    use crate::store::{MemoryStore, RoleStore, UserStore};

    async fn user(store: &MemoryStore, name: &str, role: &str) -> Uuid {
        let u = store
            .create_user(NewUser {
                username: name.into(),
                email: format!("{name}@x.com"),
                password_hash: "h".into(),
            })
            .await
            .unwrap();
        let r = store.find_role_by_name(role).await.unwrap().unwrap();
        store.assign_role(u.id, r.id).await.unwrap();
        u.id
    }

    #[tokio::test]
    async fn admin_is_superset_of_user_for_tasks() {
        let store = Arc::new(MemoryStore::new());
        seed_defaults(store.as_ref(), &SeedOptions::default())
            .await
            .unwrap();
        let plain = user(&store, "plain", "user").await;
        let admin = user(&store, "boss", "admin").await;
        let resolver = PermissionResolver::new(store.clone());

        let plain = resolver.resolve(plain).await.unwrap();
        let admin = resolver.resolve(admin).await.unwrap();

        assert!(!plain.is_admin);
        assert!(admin.is_admin);
        assert_eq!(admin.roles, vec!["admin".to_string()]);
        let plain_task = &plain.permissions["task"];
        let admin_task = &admin.permissions["task"];
        assert!(plain_task.is_subset(admin_task));
    }

    #[tokio::test]
    async fn zero_roles_is_empty_not_error() {
        let store = Arc::new(MemoryStore::new());
        let resolved = PermissionResolver::new(store)
            .resolve(Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(resolved, ResolvedPermissions::default());
    }

    #[tokio::test]
    async fn duplicate_permissions_collapse() {
        let store = Arc::new(MemoryStore::new());
        let role = store.create_role("editor").await.unwrap();
        let a = store.create_permission("task", "write").await.unwrap();
        let b = store.create_permission("task", "write").await.unwrap();
        store.grant_permission(role.id, a.id).await.unwrap();
        store.grant_permission(role.id, b.id).await.unwrap();
        let uid = user(&store, "ed", "editor").await;

        let resolved = PermissionResolver::new(store).resolve(uid).await.unwrap();
        assert_eq!(resolved.permissions["task"].len(), 1);
    }

    #[tokio::test]
    async fn admin_match_is_case_sensitive() {
        let store = Arc::new(MemoryStore::new());
        store.create_role("Admin").await.unwrap();
        let uid = user(&store, "imposter", "Admin").await;

        let resolved = PermissionResolver::new(store).resolve(uid).await.unwrap();
        assert!(!resolved.is_admin);
    }
}
