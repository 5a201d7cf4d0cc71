//! In-memory store.
//!
//! All tables live behind one `RwLock`, so every trait method is atomic with
//! respect to the others (in particular `delete_refresh_token`).

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RefreshTokenStore, RoleStore, StoreError, TaskStore, UserStore};
use crate::models::auth::{NewUser, Permission, RefreshToken, Role, User, UserWithPassword};
use crate::models::task::{SortField, SortOrder, Task, TaskFilter};

#[derive(Debug, Clone)]
struct UserRow {
    user: User,
    password_hash: String,
    deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Tables {
    users: Vec<UserRow>,
    roles: Vec<Role>,
    permissions: Vec<Permission>,
    user_roles: Vec<(Uuid, Uuid)>,
    role_permissions: Vec<(Uuid, Uuid)>,
    refresh_tokens: HashMap<String, RefreshToken>,
    tasks: HashMap<Uuid, Task>,
}

/// Store backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_refresh_token_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `insert_refresh_token` fail until reset. Used to exercise
    /// the all-or-nothing token issuance path.
    pub fn set_fail_refresh_token_writes(&self, fail: bool) {
        self.fail_refresh_token_writes
            .store(fail, AtomicOrdering::SeqCst);
    }
}

fn insert_user(tables: &mut Tables, user: NewUser) -> Result<User, StoreError> {
    if tables
        .users
        .iter()
        .any(|r| r.user.username == user.username || r.user.email == user.email)
    {
        return Err(StoreError::Conflict(
            "username or email already exists".into(),
        ));
    }
    let now = Utc::now();
    let created = User {
        id: Uuid::new_v4(),
        username: user.username,
        email: user.email,
        created_at: now,
        updated_at: now,
    };
    tables.users.push(UserRow {
        user: created.clone(),
        password_hash: user.password_hash,
        deleted_at: None,
    });
    Ok(created)
}

fn compare_tasks(a: &Task, b: &Task, field: SortField) -> Ordering {
    match field {
        SortField::Title => a.title.cmp(&b.title),
        SortField::Status => a.status.as_str().cmp(b.status.as_str()),
        SortField::Priority => a.priority.as_str().cmp(b.priority.as_str()),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_login(
        &self,
        login: &str,
    ) -> Result<Option<UserWithPassword>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|r| r.deleted_at.is_none() && (r.user.username == login || r.user.email == login))
            .map(|r| UserWithPassword {
                user: r.user.clone(),
                password_hash: r.password_hash.clone(),
            }))
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|r| r.deleted_at.is_none() && r.user.id == id)
            .map(|r| r.user.clone()))
    }

    async fn username_or_email_taken(
        &self,
        username: &str,
        email: &str,
    ) -> Result<bool, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .any(|r| r.user.username == username || r.user.email == email))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        insert_user(&mut tables, user)
    }

    async fn create_user_with_role(
        &self,
        user: NewUser,
        role_id: Uuid,
    ) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.roles.iter().any(|r| r.id == role_id) {
            return Err(StoreError::Internal(format!("role {role_id} does not exist")));
        }
        let created = insert_user(&mut tables, user)?;
        tables.user_roles.push((created.id, role_id));
        Ok(created)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .filter(|r| r.deleted_at.is_none())
            .map(|r| r.user.clone())
            .collect())
    }

    async fn soft_delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        match tables
            .users
            .iter_mut()
            .find(|r| r.deleted_at.is_none() && r.user.id == id)
        {
            Some(row) => {
                row.deleted_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.roles.iter().find(|r| r.name == name).cloned())
    }

    async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<Role>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .user_roles
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .filter_map(|(_, rid)| tables.roles.iter().find(|r| r.id == *rid).cloned())
            .collect())
    }

    async fn permissions_for_roles(
        &self,
        role_ids: &[Uuid],
    ) -> Result<Vec<Permission>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .role_permissions
            .iter()
            .filter(|(rid, _)| role_ids.contains(rid))
            .filter_map(|(_, pid)| tables.permissions.iter().find(|p| p.id == *pid).cloned())
            .collect())
    }

    async fn create_role(&self, name: &str) -> Result<Role, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.roles.iter().any(|r| r.name == name) {
            return Err(StoreError::Conflict(format!("role '{name}' already exists")));
        }
        let role = Role {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        tables.roles.push(role.clone());
        Ok(role)
    }

    async fn create_permission(
        &self,
        resource: &str,
        action: &str,
    ) -> Result<Permission, StoreError> {
        let permission = Permission {
            id: Uuid::new_v4(),
            resource: resource.to_string(),
            action: action.to_string(),
        };
        self.tables
            .write()
            .await
            .permissions
            .push(permission.clone());
        Ok(permission)
    }

    async fn grant_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .role_permissions
            .push((role_id, permission_id));
        Ok(())
    }

    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> Result<(), StoreError> {
        self.tables.write().await.user_roles.push((user_id, role_id));
        Ok(())
    }

    async fn role_count(&self) -> Result<i64, StoreError> {
        Ok(self.tables.read().await.roles.len() as i64)
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn insert_refresh_token(&self, token: &RefreshToken) -> Result<(), StoreError> {
        if self.fail_refresh_token_writes.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Internal("refresh token write refused".into()));
        }
        self.tables
            .write()
            .await
            .refresh_tokens
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn find_valid_refresh_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .refresh_tokens
            .get(token_hash)
            .filter(|t| t.expires_at > now)
            .cloned())
    }

    async fn delete_refresh_token(&self, token_hash: &str) -> Result<u64, StoreError> {
        let removed = self.tables.write().await.refresh_tokens.remove(token_hash);
        Ok(u64::from(removed.is_some()))
    }

    async fn delete_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.refresh_tokens.len();
        tables.refresh_tokens.retain(|_, t| t.expires_at > now);
        Ok((before - tables.refresh_tokens.len()) as u64)
    }

    async fn delete_refresh_tokens_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.refresh_tokens.len();
        tables.refresh_tokens.retain(|_, t| t.user_id != user_id);
        Ok((before - tables.refresh_tokens.len()) as u64)
    }

    async fn refresh_token_count(&self) -> Result<i64, StoreError> {
        Ok(self.tables.read().await.refresh_tokens.len() as i64)
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        self.tables.write().await.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self.tables.read().await.tasks.get(&id).cloned())
    }

    async fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        match tables.tasks.get_mut(&task.id) {
            Some(row) => {
                row.title.clone_from(&task.title);
                row.description.clone_from(&task.description);
                row.status = task.status;
                row.priority = task.priority;
                row.updated_at = task.updated_at;
                Ok(())
            }
            None => Err(StoreError::Db(sqlx::Error::RowNotFound)),
        }
    }

    async fn delete_task(&self, id: Uuid) -> Result<u64, StoreError> {
        let removed = self.tables.write().await.tasks.remove(&id);
        Ok(u64::from(removed.is_some()))
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<(Vec<Task>, i64), StoreError> {
        let tables = self.tables.read().await;
        let q = &filter.query;
        let needle = q.search.to_lowercase();
        let mut matched: Vec<Task> = tables
            .tasks
            .values()
            .filter(|t| filter.owner.is_none_or(|owner| t.user_id == owner))
            .filter(|t| q.status.is_none_or(|s| t.status == s))
            .filter(|t| q.priority.is_none_or(|p| t.priority == p))
            .filter(|t| {
                needle.is_empty()
                    || t.title.to_lowercase().contains(&needle)
                    || t.description.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            let ord = compare_tasks(a, b, q.sort_by);
            match q.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        let total = matched.len() as i64;
        let page = matched
            .into_iter()
            .skip(q.offset() as usize)
            .take(q.limit() as usize)
            .collect();
        Ok((page, total))
    }

    async fn tasks_for_user(&self, user_id: Uuid) -> Result<Vec<Task>, StoreError> {
        let tables = self.tables.read().await;
        let mut tasks: Vec<Task> = tables
            .tasks
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }
}
