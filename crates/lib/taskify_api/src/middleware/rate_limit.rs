//! Per-client-IP rate limiting middleware.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use taskify_core::rate_limit::RateLimiter;

use crate::error::AppError;

/// Client address: the socket peer when known, else the first
/// `X-Forwarded-For` entry.
pub fn client_ip(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// Axum middleware: 429 once the client's bucket is empty.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = client_ip(&request);
    if !limiter.allow(&ip) {
        warn!(%ip, path = %request.uri().path(), "rate limit exceeded");
        return Err(AppError::RateLimited(
            "Too many requests. Please try again later.".into(),
        ));
    }
    Ok(next.run(request).await)
}
