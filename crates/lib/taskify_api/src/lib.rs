//! # taskify_api
//!
//! HTTP API library for Taskify.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{MethodRouter, delete, get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use taskify_core::auth::AuthError;
use taskify_core::auth::jwt::JwtKeys;
use taskify_core::auth::service::AuthService;
use taskify_core::cache::{Cache, EntityCache};
use taskify_core::rate_limit::RateLimiter;
use taskify_core::store::Store;
use taskify_core::tasks::TaskService;
use taskify_core::users::UserService;

use crate::config::ApiConfig;
use crate::handlers::{auth, health, tasks, users};
use crate::middleware::auth::{RequiredPermission, require_admin, require_auth, require_permission};
use crate::middleware::rate_limit::rate_limit;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: EntityCache,
    pub auth: AuthService,
    pub tasks: TaskService,
    pub users: UserService,
    pub general_limiter: Arc<RateLimiter>,
    pub auth_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Wire every service over `store` with an in-memory cache sized from `config`.
    pub fn new(config: &ApiConfig, store: Arc<dyn Store>) -> Result<Self, AuthError> {
        let keys = JwtKeys::from_secret(config.jwt_secret.as_bytes())?;
        let cache = EntityCache::new(Cache::in_memory(config.cache_capacity_bytes));
        Ok(Self {
            auth: AuthService::new(store.clone(), keys),
            tasks: TaskService::new(store.clone(), cache.clone()),
            users: UserService::new(store, cache.clone()),
            general_limiter: Arc::new(RateLimiter::new(config.general_rate_limit())),
            auth_limiter: Arc::new(RateLimiter::new(config.auth_rate_limit())),
            cache,
        })
    }
}

fn permission(
    route: MethodRouter<AppState>,
    resource: &'static str,
    action: &'static str,
) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(
        RequiredPermission::new(resource, action),
        require_permission,
    ))
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Auth routes (stricter rate limit, no token required)
    let auth_routes = Router::new()
        .route(routes::POST_AUTH_REGISTER, post(auth::register_handler))
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_AUTH_REFRESH, post(auth::refresh_handler))
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler))
        .route_layer(from_fn_with_state(state.auth_limiter.clone(), rate_limit));

    let admin_routes = Router::new()
        .route(routes::USERS, get(users::list_users_handler))
        .route(routes::USERS_ID, delete(users::delete_user_handler))
        .route_layer(from_fn(require_admin));

    // Protected routes (require auth, then a per-route permission)
    let protected = Router::new()
        .route(
            routes::TASKS,
            permission(post(tasks::create_task_handler), "task", "create")
                .merge(permission(get(tasks::list_tasks_handler), "task", "read")),
        )
        .route(
            routes::TASKS_ID,
            permission(get(tasks::get_task_handler), "task", "read")
                .merge(permission(put(tasks::update_task_handler), "task", "write"))
                .merge(permission(delete(tasks::delete_task_handler), "task", "delete")),
        )
        .route(
            routes::USERS_PROFILE,
            permission(get(users::my_profile_handler), "profile", "read"),
        )
        .route(
            routes::USERS_PROFILE_ID,
            permission(get(users::profile_handler), "profile", "read"),
        )
        .route(
            routes::USERS_ID_TASKS,
            permission(get(users::user_tasks_handler), "task", "read"),
        )
        .merge(admin_routes)
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route(routes::GET_HEALTH, get(health::health))
        .merge(auth_routes)
        .merge(protected)
        .layer(from_fn_with_state(state.general_limiter.clone(), rate_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
