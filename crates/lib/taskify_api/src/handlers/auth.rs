//! Authentication request handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use taskify_core::auth::service::Registration;
use taskify_core::models::auth::User;

use crate::AppState;
use crate::error::AppResult;
use crate::models::{
    LoginRequest, MessageResponse, RefreshRequest, RegisterRequest, TokenResponse,
};

/// `POST /api/v1/auth/register`: create an account with the default role.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = state
        .auth
        .register(Registration {
            username: body.username,
            email: body.email,
            password: body.password,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// `POST /api/v1/auth/login`: authenticate with username (or email) + password.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let pair = state.auth.login(&body.username, &body.password).await?;
    Ok(Json(pair.into()))
}

/// `POST /api/v1/auth/refresh`: exchange a refresh token for a new pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<TokenResponse>> {
    let pair = state.auth.refresh(&body.refresh_token).await?;
    Ok(Json(pair.into()))
}

/// `POST /api/v1/auth/logout`: invalidate a refresh token.
pub async fn logout_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<MessageResponse>> {
    state.auth.logout(&body.refresh_token).await?;
    Ok(Json(MessageResponse {
        message: "Logged out".into(),
    }))
}
