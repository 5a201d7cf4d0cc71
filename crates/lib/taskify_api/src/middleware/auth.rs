//! Authentication and authorization middleware.
//!
//! `require_auth` is the only way identity reaches handlers: it verifies the
//! bearer token and stores the claims in request extensions. The permission
//! and admin checks read those claims and never touch storage.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use taskify_core::auth::guard;
use taskify_core::models::auth::AccessClaims;

use crate::AppState;
use crate::error::AppError;

/// Key used to store `AccessClaims` in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub AccessClaims);

/// A `resource:action` pair a route requires.
#[derive(Debug, Clone, Copy)]
pub struct RequiredPermission {
    pub resource: &'static str,
    pub action: &'static str,
}

impl RequiredPermission {
    pub const fn new(resource: &'static str, action: &'static str) -> Self {
        Self { resource, action }
    }
}

fn claims(request: &Request) -> Result<&AccessClaims, AppError> {
    request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|u| &u.0)
        .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))
}

/// Axum middleware: extracts `Authorization: Bearer <token>`, verifies the JWT,
/// and injects `AuthenticatedUser` into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let claims = guard::authenticate(header, state.auth.keys())?;
    debug!(user_id = %claims.user_id, "authenticated request");
    request.extensions_mut().insert(AuthenticatedUser(claims));

    Ok(next.run(request).await)
}

/// Axum middleware: rejects with 403 unless the claims grant `required`.
pub async fn require_permission(
    State(required): State<RequiredPermission>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    guard::authorize_permission(claims(&request)?, required.resource, required.action)?;
    Ok(next.run(request).await)
}

/// Axum middleware: rejects with 403 unless the claims carry the admin flag.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    guard::authorize_admin(claims(&request)?)?;
    Ok(next.run(request).await)
}
