//! Task request handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use uuid::Uuid;

use taskify_core::models::task::{NewTask, Task, TaskListParams, TaskPage, TaskUpdate};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::MessageResponse;

/// `POST /api/v1/tasks`
pub async fn create_task_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Json(body): Json<NewTask>,
) -> AppResult<(StatusCode, Json<Task>)> {
    let task = state.tasks.create(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// `GET /api/v1/tasks`: paginated, filtered, sorted listing.
pub async fn list_tasks_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Query(params): Query<TaskListParams>,
) -> AppResult<Json<TaskPage>> {
    let page = state.tasks.list(&user.0, params.into()).await?;
    Ok(Json(page))
}

/// `GET /api/v1/tasks/{id}`
pub async fn get_task_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Task>> {
    Ok(Json(state.tasks.get(&user.0, id).await?))
}

/// `PUT /api/v1/tasks/{id}`: partial update.
pub async fn update_task_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<TaskUpdate>,
) -> AppResult<Json<Task>> {
    Ok(Json(state.tasks.update(&user.0, id, body).await?))
}

/// `DELETE /api/v1/tasks/{id}`
pub async fn delete_task_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    state.tasks.delete(&user.0, id).await?;
    Ok(Json(MessageResponse {
        message: "Task deleted".into(),
    }))
}
