//! Integration tests (build the router over an in-memory store and drive it
//! with `oneshot` requests).

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use taskify_api::{AppState, config::ApiConfig};
use taskify_core::seed::{SeedOptions, seed_defaults};
use taskify_core::auth::password::hash_password;
use taskify_core::models::auth::NewUser;
use taskify_core::store::{MemoryStore, RefreshTokenStore, UserStore};
use tower::ServiceExt;

const ADMIN_PASSWORD: &str = "admin-pass";

fn test_config() -> ApiConfig {
    ApiConfig {
        jwt_secret: "test-secret".into(),
        general_burst: 10_000,
        auth_burst: 10_000,
        ..ApiConfig::default()
    }
}

async fn app_with(config: ApiConfig) -> (Router, AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    seed_defaults(
        store.as_ref(),
        &SeedOptions {
            admin_password: Some(ADMIN_PASSWORD.into()),
        },
    )
    .await
    .expect("seed");
    let state = AppState::new(&config, store.clone()).expect("state");
    (taskify_api::router(state.clone()), state, store)
}

async fn app() -> (Router, AppState, Arc<MemoryStore>) {
    app_with(test_config()).await
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header("authorization", format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => req
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => req.body(Body::empty()),
    }
    .expect("request");

    let resp = app.clone().oneshot(req).await.expect("response");
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn register(app: &Router, username: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/api/v1/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@x.com"),
            "password": password,
        })),
    )
    .await
}

async fn login(app: &Router, username: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await
}

async fn access_token(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = login(app, username, password).await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["access_token"].as_str().expect("access_token").to_string()
}

#[tokio::test]
async fn health_endpoint_returns_expected_shape() {
    let (app, _, _) = app().await;
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy", "service": "taskify-api"}));
}

#[tokio::test]
async fn register_and_login() {
    let (app, state, _) = app().await;

    let (status, user) = register(&app, "alice", "secret1").await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(user.get("password_hash").is_none());

    let (status, body) = login(&app, "alice", "secret1").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["access_token"].as_str().unwrap().is_empty());
    assert!(!body["refresh_token"].as_str().unwrap().is_empty());
    assert_eq!(body["expires_in"], 3600);

    let claims = taskify_core::auth::jwt::verify_access_token(
        body["access_token"].as_str().unwrap(),
        state.auth.keys(),
    )
    .unwrap();
    assert_eq!(claims.sub, user["id"].as_str().unwrap());
}

#[tokio::test]
async fn wrong_password_is_401_and_creates_no_refresh_token() {
    let (app, _, store) = app().await;
    register(&app, "alice", "secret1").await;
    let before = store.refresh_token_count().await.unwrap();

    let (status, body) = login(&app, "alice", "wrongpass").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
    assert!(body.get("access_token").is_none());
    assert_eq!(store.refresh_token_count().await.unwrap(), before);
}

#[tokio::test]
async fn registration_rules() {
    let (app, _, _) = app().await;
    let (status, body) = register(&app, "short", "12345").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    assert_eq!(register(&app, "exact", "123456").await.0, StatusCode::CREATED);
    assert_eq!(register(&app, "exact", "123456").await.0, StatusCode::CONFLICT);
}

#[tokio::test]
async fn refresh_rotates_and_old_token_dies() {
    let (app, _, _) = app().await;
    register(&app, "alice", "secret1").await;
    let (_, pair) = login(&app, "alice", "secret1").await;
    let old = pair["refresh_token"].as_str().unwrap();

    let (status, fresh) = send(
        &app,
        "POST",
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refresh_token": old })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(fresh["refresh_token"], pair["refresh_token"]);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refresh_token": old })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refresh_token": "not-a-token" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn logout_invalidates_refresh_token() {
    let (app, _, _) = app().await;
    register(&app, "alice", "secret1").await;
    let (_, pair) = login(&app, "alice", "secret1").await;
    let body = json!({ "refresh_token": pair["refresh_token"] });

    let (status, _) = send(&app, "POST", "/api/v1/auth/logout", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "POST", "/api/v1/auth/logout", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "POST", "/api/v1/auth/refresh", None, Some(body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_or_bad_bearer_is_401() {
    let (app, _, _) = app().await;
    let (status, _) = send(&app, "GET", "/api/v1/tasks", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, "GET", "/api/v1/tasks", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn task_ownership_is_enforced_and_admin_bypasses_it() {
    let (app, _, _) = app().await;
    register(&app, "owner", "secret1").await;
    register(&app, "other", "secret1").await;
    let owner = access_token(&app, "owner", "secret1").await;
    let other = access_token(&app, "other", "secret1").await;
    let admin = access_token(&app, "admin", ADMIN_PASSWORD).await;

    let (status, task) = send(
        &app,
        "POST",
        "/api/v1/tasks",
        Some(&owner),
        Some(json!({ "title": "ship it" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(task["status"], "pending");
    assert_eq!(task["priority"], "medium");
    let uri = format!("/api/v1/tasks/{}", task["id"].as_str().unwrap());

    let update = json!({ "status": "completed" });
    let (status, _) = send(&app, "PUT", &uri, Some(&other), Some(update.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "DELETE", &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = send(&app, "PUT", &uri, Some(&admin), Some(update)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "completed");
    assert_eq!(updated["user_id"], task["user_id"]);

    let (status, _) = send(&app, "DELETE", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn repeated_task_fetch_is_served_from_cache() {
    let (app, state, _) = app().await;
    register(&app, "alice", "secret1").await;
    let token = access_token(&app, "alice", "secret1").await;
    let (_, task) = send(
        &app,
        "POST",
        "/api/v1/tasks",
        Some(&token),
        Some(json!({ "title": "cached", "priority": "high" })),
    )
    .await;
    let uri = format!("/api/v1/tasks/{}", task["id"].as_str().unwrap());

    let (_, first) = send(&app, "GET", &uri, Some(&token), None).await;
    let hits = state.cache.stats().hits();
    let (_, second) = send(&app, "GET", &uri, Some(&token), None).await;
    assert_eq!(state.cache.stats().hits(), hits + 1);
    assert_eq!(first, second);
}

#[tokio::test]
async fn task_listing_is_paginated_and_scoped() {
    let (app, _, _) = app().await;
    register(&app, "alice", "secret1").await;
    register(&app, "bob", "secret1").await;
    let alice = access_token(&app, "alice", "secret1").await;
    let bob = access_token(&app, "bob", "secret1").await;
    let admin = access_token(&app, "admin", ADMIN_PASSWORD).await;
    for i in 0..3 {
        send(
            &app,
            "POST",
            "/api/v1/tasks",
            Some(&alice),
            Some(json!({ "title": format!("a{i}") })),
        )
        .await;
    }
    send(&app, "POST", "/api/v1/tasks", Some(&bob), Some(json!({ "title": "b0" }))).await;

    let (status, page) = send(
        &app,
        "GET",
        "/api/v1/tasks?page=1&page_size=2&sort_by=title&sort_order=asc",
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert_eq!(page["data"][0]["title"], "a0");
    assert_eq!(page["pagination"]["total"], 3);
    assert_eq!(page["pagination"]["total_pages"], 2);
    assert_eq!(page["pagination"]["has_next"], true);
    assert_eq!(page["pagination"]["has_prev"], false);

    let (_, all) = send(&app, "GET", "/api/v1/tasks", Some(&admin), None).await;
    assert_eq!(all["pagination"]["total"], 4);
}

#[tokio::test]
async fn user_routes_require_the_right_role() {
    let (app, _, _) = app().await;
    let (_, alice_user) = register(&app, "alice", "secret1").await;
    let (_, bob_user) = register(&app, "bob", "secret1").await;
    let alice = access_token(&app, "alice", "secret1").await;
    let admin = access_token(&app, "admin", ADMIN_PASSWORD).await;
    let alice_id = alice_user["id"].as_str().unwrap();
    let bob_id = bob_user["id"].as_str().unwrap();

    let (status, me) = send(&app, "GET", "/api/v1/users/profile", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "alice");

    let bob_profile = format!("/api/v1/users/profile/{bob_id}");
    let (status, _) = send(&app, "GET", &bob_profile, Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let bob_tasks = format!("/api/v1/users/{bob_id}/tasks");
    let (status, _) = send(&app, "GET", &bob_tasks, Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let alice_tasks = format!("/api/v1/users/{alice_id}/tasks");
    let (status, tasks) = send(&app, "GET", &alice_tasks, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(tasks.as_array().unwrap().is_empty());

    let (status, _) = send(&app, "GET", "/api/v1/users", Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, users) = send(&app, "GET", "/api/v1/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 3);

    let bob_uri = format!("/api/v1/users/{bob_id}");
    let (status, _) = send(&app, "DELETE", &bob_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = login(&app, "bob", "secret1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_after_account_deletion_is_401() {
    let (app, _, store) = app().await;
    let (_, bob_user) = register(&app, "bob", "secret1").await;
    let (_, pair) = login(&app, "bob", "secret1").await;
    let admin = access_token(&app, "admin", ADMIN_PASSWORD).await;

    let bob_uri = format!("/api/v1/users/{}", bob_user["id"].as_str().unwrap());
    let (status, _) = send(&app, "DELETE", &bob_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refresh_token": pair["refresh_token"] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
    assert!(!body["message"].as_str().unwrap().contains(bob_user["id"].as_str().unwrap()));

    // bob's session was revoked with the account; only the admin's two remain
    let (_, admin_pair) = login(&app, "admin", ADMIN_PASSWORD).await;
    assert!(admin_pair["refresh_token"].is_string());
    assert_eq!(store.refresh_token_count().await.unwrap(), 2);
}

#[tokio::test]
async fn own_profile_requires_profile_read() {
    let (app, _, store) = app().await;
    store
        .create_user(NewUser {
            username: "norole".into(),
            email: "norole@x.com".into(),
            password_hash: hash_password("secret1").unwrap(),
        })
        .await
        .unwrap();
    let token = access_token(&app, "norole", "secret1").await;

    let (status, body) = send(&app, "GET", "/api/v1/users/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn auth_endpoints_are_rate_limited_per_ip() {
    let (app, _, _) = app_with(ApiConfig {
        auth_burst: 3,
        auth_rate_per_sec: 0.001,
        ..test_config()
    })
    .await;

    let attempt = |ip: &'static str| {
        let app = app.clone();
        async move {
            let req = Request::builder()
                .method("POST")
                .uri("/api/v1/auth/login")
                .header("content-type", "application/json")
                .header("x-forwarded-for", ip)
                .body(Body::from(json!({"username": "x", "password": "y"}).to_string()))
                .unwrap();
            app.oneshot(req).await.unwrap().status()
        }
    };

    for _ in 0..3 {
        assert_eq!(attempt("10.0.0.1").await, StatusCode::UNAUTHORIZED);
    }
    assert_eq!(attempt("10.0.0.1").await, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(attempt("10.0.0.2").await, StatusCode::UNAUTHORIZED);
}
