//! Typed per-entity cache accessors.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Cache, CacheBackend};
use crate::models::auth::User;
use crate::models::task::{Task, TaskPage, TaskQuery};

const USER_PROFILE_COST: u32 = 1024;
const TASK_COST: u32 = 2048;
const USER_TASKS_COST: u32 = 5120;
const TASK_PAGE_COST: u32 = 2048;

pub fn user_profile_key(user_id: Uuid) -> String {
    format!("user_profile:{user_id}")
}

pub fn task_key(task_id: Uuid) -> String {
    format!("task:{task_id}")
}

pub fn user_tasks_key(user_id: Uuid) -> String {
    format!("user_tasks:{user_id}")
}

/// Composite key over every parameter that affects a task listing.
pub fn task_page_key(user_id: Uuid, is_admin: bool, q: &TaskQuery) -> String {
    let mut key = format!(
        "tasks:user:{user_id}:admin:{is_admin}:page:{}:size:{}:search:{}:sort:{}:{}",
        q.page,
        q.page_size,
        q.search,
        q.sort_by.column(),
        q.sort_order.as_str(),
    );
    if let Some(status) = q.status {
        key.push_str(":status:");
        key.push_str(status.as_str());
    }
    if let Some(priority) = q.priority {
        key.push_str(":priority:");
        key.push_str(priority.as_str());
    }
    key
}

/// Hit/miss counters.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// Process-wide entity cache. Cheap to clone.
#[derive(Clone)]
pub struct EntityCache {
    backend: Cache,
    stats: Arc<CacheStats>,
}

impl EntityCache {
    pub fn new(backend: Cache) -> Self {
        Self {
            backend,
            stats: Arc::new(CacheStats::default()),
        }
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    async fn read<T: DeserializeOwned + Send + Sync>(&self, key: &str) -> Option<T> {
        let found = match self.backend.get::<T>(key).await {
            Ok(found) => found,
            Err(e) => {
                warn!(key, error = %e, "cache read failed, treating as miss");
                self.backend.delete(key).await;
                None
            }
        };
        let counter = if found.is_some() {
            &self.stats.hits
        } else {
            &self.stats.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    async fn write<T: Serialize + Send + Sync + ?Sized>(
        &self,
        key: &str,
        value: &T,
        cost: u32,
    ) -> bool {
        match self.backend.set(key, value, cost).await {
            Ok(true) => true,
            Ok(false) => {
                debug!(key, cost, "cache rejected insert");
                false
            }
            Err(e) => {
                warn!(key, error = %e, "cache write failed");
                false
            }
        }
    }

    pub async fn get_user_profile(&self, user_id: Uuid) -> Option<User> {
        self.read(&user_profile_key(user_id)).await
    }

    pub async fn set_user_profile(&self, user: &User) -> bool {
        self.write(&user_profile_key(user.id), user, USER_PROFILE_COST)
            .await
    }

    pub async fn get_task(&self, task_id: Uuid) -> Option<Task> {
        self.read(&task_key(task_id)).await
    }

    pub async fn set_task(&self, task: &Task) -> bool {
        self.write(&task_key(task.id), task, TASK_COST).await
    }

    pub async fn get_user_tasks(&self, user_id: Uuid) -> Option<Vec<Task>> {
        self.read(&user_tasks_key(user_id)).await
    }

    pub async fn set_user_tasks(&self, user_id: Uuid, tasks: &[Task]) -> bool {
        self.write(&user_tasks_key(user_id), tasks, USER_TASKS_COST)
            .await
    }

    pub async fn get_task_page(
        &self,
        user_id: Uuid,
        is_admin: bool,
        query: &TaskQuery,
    ) -> Option<TaskPage> {
        self.read(&task_page_key(user_id, is_admin, query)).await
    }

    pub async fn set_task_page(
        &self,
        user_id: Uuid,
        is_admin: bool,
        query: &TaskQuery,
        page: &TaskPage,
    ) -> bool {
        self.write(&task_page_key(user_id, is_admin, query), page, TASK_PAGE_COST)
            .await
    }

    /// Clear a user's profile and aggregate task list. Composite listing keys
    /// are left to expire through eviction.
    pub async fn invalidate_user(&self, user_id: Uuid) {
        self.backend.delete(&user_profile_key(user_id)).await;
        self.backend.delete(&user_tasks_key(user_id)).await;
    }

    /// Clear the single-task entry.
    pub async fn invalidate_task(&self, task_id: Uuid) {
        self.backend.delete(&task_key(task_id)).await;
    }
}
