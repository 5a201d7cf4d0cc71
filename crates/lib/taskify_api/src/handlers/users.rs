//! User request handlers.

use axum::Json;
use axum::extract::{Path, State};
use uuid::Uuid;

use taskify_core::models::auth::User;
use taskify_core::models::task::Task;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::MessageResponse;

/// `GET /api/v1/users/profile`: the caller's own profile.
pub async fn my_profile_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
) -> AppResult<Json<User>> {
    let claims = &user.0;
    Ok(Json(state.users.profile(claims, claims.user_id).await?))
}

/// `GET /api/v1/users/profile/{user_id}`
pub async fn profile_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<User>> {
    Ok(Json(state.users.profile(&user.0, user_id).await?))
}

/// `GET /api/v1/users/{user_id}/tasks`: every task the user owns.
pub async fn user_tasks_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<Task>>> {
    Ok(Json(state.tasks.tasks_for_user(&user.0, user_id).await?))
}

/// `GET /api/v1/users`: admin only.
pub async fn list_users_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.users.list(&user.0).await?))
}

/// `DELETE /api/v1/users/{user_id}`: admin only, soft delete.
pub async fn delete_user_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    state.users.delete(&user.0, user_id).await?;
    Ok(Json(MessageResponse {
        message: "User deleted".into(),
    }))
}
