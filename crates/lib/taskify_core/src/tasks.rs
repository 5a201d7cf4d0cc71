//! Task operations with ownership enforcement and write-through caching.
//!
//! Admins act on any task; everyone else only on their own. Cache updates are
//! best-effort and never fail an operation.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::EntityCache;
use crate::models::auth::AccessClaims;
use crate::models::task::{NewTask, Task, TaskFilter, TaskPage, TaskQuery, TaskUpdate};
use crate::store::{Store, StoreError};
use crate::uuid::uuidv7;

/// Task errors.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task not found")]
    NotFound,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

fn ensure_access(actor: &AccessClaims, task: &Task, verb: &str) -> Result<(), TaskError> {
    if actor.is_admin || task.user_id == actor.user_id {
        Ok(())
    } else {
        Err(TaskError::Forbidden(format!(
            "cannot {verb} task owned by another user"
        )))
    }
}

fn validate_title(title: &str) -> Result<(), TaskError> {
    if title.trim().is_empty() {
        return Err(TaskError::Validation("title is required".into()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn Store>,
    cache: EntityCache,
}

impl TaskService {
    pub fn new(store: Arc<dyn Store>, cache: EntityCache) -> Self {
        Self { store, cache }
    }

    /// Create a task owned by the actor.
    pub async fn create(&self, actor: &AccessClaims, input: NewTask) -> Result<Task, TaskError> {
        validate_title(&input.title)?;
        let now = Utc::now();
        let task = Task {
            id: uuidv7(),
            title: input.title.trim().to_string(),
            description: input.description,
            status: input.status.unwrap_or_default(),
            priority: input.priority.unwrap_or_default(),
            user_id: actor.user_id,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_task(&task).await?;

        self.cache.set_task(&task).await;
        self.cache.invalidate_user(task.user_id).await;
        info!(task_id = %task.id, user_id = %task.user_id, "task created");
        Ok(task)
    }

    /// Fetch one task, read-through the cache.
    pub async fn get(&self, actor: &AccessClaims, id: Uuid) -> Result<Task, TaskError> {
        if let Some(task) = self.cache.get_task(id).await {
            ensure_access(actor, &task, "view")?;
            return Ok(task);
        }

        let task = self.store.find_task(id).await?.ok_or(TaskError::NotFound)?;
        ensure_access(actor, &task, "view")?;
        self.cache.set_task(&task).await;
        Ok(task)
    }

    /// Apply a partial update. The owner never changes.
    pub async fn update(
        &self,
        actor: &AccessClaims,
        id: Uuid,
        changes: TaskUpdate,
    ) -> Result<Task, TaskError> {
        let mut task = self.store.find_task(id).await?.ok_or(TaskError::NotFound)?;
        ensure_access(actor, &task, "update")?;

        if let Some(title) = changes.title {
            validate_title(&title)?;
            task.title = title.trim().to_string();
        }
        if let Some(description) = changes.description {
            task.description = description;
        }
        if let Some(status) = changes.status {
            task.status = status;
        }
        if let Some(priority) = changes.priority {
            task.priority = priority;
        }
        task.updated_at = Utc::now();
        self.store.update_task(&task).await?;

        self.cache.set_task(&task).await;
        self.cache.invalidate_user(task.user_id).await;
        debug!(task_id = %task.id, "task updated");
        Ok(task)
    }

    pub async fn delete(&self, actor: &AccessClaims, id: Uuid) -> Result<(), TaskError> {
        let task = self.store.find_task(id).await?.ok_or(TaskError::NotFound)?;
        ensure_access(actor, &task, "delete")?;

        if self.store.delete_task(id).await? == 0 {
            return Err(TaskError::NotFound);
        }
        self.cache.invalidate_task(id).await;
        self.cache.invalidate_user(task.user_id).await;
        info!(task_id = %id, "task deleted");
        Ok(())
    }

    /// One page of tasks: the actor's own, or everyone's for admins.
    pub async fn list(
        &self,
        actor: &AccessClaims,
        query: TaskQuery,
    ) -> Result<TaskPage, TaskError> {
        if let Some(page) = self
            .cache
            .get_task_page(actor.user_id, actor.is_admin, &query)
            .await
        {
            return Ok(page);
        }

        let filter = TaskFilter {
            owner: (!actor.is_admin).then_some(actor.user_id),
            query,
        };
        let (data, total) = self.store.list_tasks(&filter).await?;
        let page = TaskPage::new(data, total, &filter.query);
        self.cache
            .set_task_page(actor.user_id, actor.is_admin, &filter.query, &page)
            .await;
        Ok(page)
    }

    /// Every task owned by `owner`. Self or admin only.
    pub async fn tasks_for_user(
        &self,
        actor: &AccessClaims,
        owner: Uuid,
    ) -> Result<Vec<Task>, TaskError> {
        if !actor.is_admin && actor.user_id != owner {
            return Err(TaskError::Forbidden(
                "cannot view tasks of another user".into(),
            ));
        }
        if let Some(tasks) = self.cache.get_user_tasks(owner).await {
            return Ok(tasks);
        }
        let tasks = self.store.tasks_for_user(owner).await?;
        self.cache.set_user_tasks(owner, &tasks).await;
        Ok(tasks)
    }
}
