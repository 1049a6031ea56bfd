//! End-to-end HTTP surface tests, driven the same way
//! `examples/mikefaille-adk-rust/adk-studio/tests/cors_tests.rs` drives its
//! router: build the real `axum::Router` and send requests through
//! `tower::ServiceExt::oneshot`, no network socket involved.
//!
//! The chat tests stand up a tiny local axum server as a stand-in for the
//! external LLM backend so the cache-hit/cost-accounting scenario in the
//! specification's end-to-end section can be exercised against the real
//! HTTP dispatch path rather than mocked at the trait level.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use gateway_core::GatewayConfig;
use gateway_server::{build_router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

/// Starts a throwaway axum server answering every POST with a fixed
/// chat-completion-shaped body, mirroring the external LLM service's wire
/// format consumed by `gateway_router::client::HttpLlmClient`.
async fn spawn_mock_llm() -> String {
    async fn reply() -> Json<Value> {
        Json(json!({ "choices": [{ "message": { "content": "mock answer" } }] }))
    }

    let app = Router::new().route("/{*rest}", post(reply));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn test_config(llm_base_url: String) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.llm_base_url = llm_base_url;
    config.allowed_hosts = vec!["localhost".to_string(), "127.0.0.1".to_string()];
    config.cors_origins = vec!["http://allowed.example".to_string()];
    config
}

async fn test_app(config: GatewayConfig) -> Router {
    let state = Arc::new(AppState::new(config));
    build_router(state)
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::HOST, "localhost")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login(app: &Router, username: &str, password: &str) -> (StatusCode, Value) {
    let req = json_request(
        Method::POST,
        "/api/v1/auth/login",
        json!({ "username": username, "password": password }),
    );
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

#[tokio::test]
async fn login_then_chat_twice_is_a_cache_hit_on_the_second_call() {
    let llm = spawn_mock_llm().await;
    let app = test_app(test_config(llm)).await;

    let (status, body) = login(&app, "admin", "SecurePassword123!").await;
    assert_eq!(status, StatusCode::OK);
    let access_token = body["access_token"].as_str().unwrap().to_string();

    let chat_req = |content: &str| {
        Request::builder()
            .method(Method::POST)
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::HOST, "localhost")
            .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
            .body(Body::from(json!({ "content": content }).to_string()))
            .unwrap()
    };

    let first = app.clone().oneshot(chat_req("what is total revenue")).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first_body = body_json(first).await;
    assert_eq!(first_body["cached"], false);
    assert_eq!(first_body["fallback"], false);
    assert_eq!(first_body["variant"], "nano");

    let second = app.clone().oneshot(chat_req("what is total revenue")).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let second_body = body_json(second).await;
    assert_eq!(second_body["cached"], true);
    assert_eq!(second_body["content"], first_body["content"]);
}

#[tokio::test]
async fn chat_without_a_bearer_token_is_unauthorized() {
    let llm = spawn_mock_llm().await;
    let app = test_app(test_config(llm)).await;

    let req = json_request(Method::POST, "/api/chat", json!({ "content": "anything" }));
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn chat_with_empty_content_is_rejected_as_invalid() {
    let llm = spawn_mock_llm().await;
    let app = test_app(test_config(llm)).await;
    let (_, login_body) = login(&app, "admin", "SecurePassword123!").await;
    let access_token = login_body["access_token"].as_str().unwrap();

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::HOST, "localhost")
        .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
        .body(Body::from(json!({ "content": "   " }).to_string()))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn five_failed_logins_lock_out_the_sixth_attempt_even_with_the_right_password() {
    let llm = spawn_mock_llm().await;
    let app = test_app(test_config(llm)).await;

    for _ in 0..5 {
        let (status, _) = login(&app, "admin", "wrong-password").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, body) = login(&app, "admin", "SecurePassword123!").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["error"].as_str().unwrap().contains("locked"));
}

#[tokio::test]
async fn unknown_host_header_is_refused_before_any_handler_runs() {
    let llm = spawn_mock_llm().await;
    let app = test_app(test_config(llm)).await;

    let req = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .header(header::HOST, "evil.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn every_response_carries_security_headers_and_a_response_id() {
    let llm = spawn_mock_llm().await;
    let app = test_app(test_config(llm)).await;

    let req = Request::builder().method(Method::GET).uri("/health").header(header::HOST, "localhost").body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(header::STRICT_TRANSPORT_SECURITY));
    assert_eq!(response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
    assert_eq!(response.headers().get(header::X_FRAME_OPTIONS).unwrap(), "DENY");
}

#[tokio::test]
async fn allowed_cors_origin_is_echoed_back_on_preflight() {
    let llm = spawn_mock_llm().await;
    let app = test_app(test_config(llm)).await;

    let allowed = Request::builder()
        .method(Method::OPTIONS)
        .uri("/health")
        .header(header::HOST, "localhost")
        .header(header::ORIGIN, "http://allowed.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(allowed).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "http://allowed.example");

    let rejected = Request::builder()
        .method(Method::OPTIONS)
        .uri("/health")
        .header(header::HOST, "localhost")
        .header(header::ORIGIN, "http://not-allowed.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(rejected).await.unwrap();
    assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn unsupported_content_type_on_post_is_rejected() {
    let llm = spawn_mock_llm().await;
    let app = test_app(test_config(llm)).await;

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/auth/login")
        .header(header::CONTENT_TYPE, "text/plain")
        .header(header::HOST, "localhost")
        .body(Body::from("username=admin&password=whatever"))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn a_body_over_ten_mebibytes_is_rejected_with_413() {
    let llm = spawn_mock_llm().await;
    let app = test_app(test_config(llm)).await;

    let oversized = vec![b'a'; 10 * 1024 * 1024 + 1];
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::HOST, "localhost")
        .header(header::CONTENT_LENGTH, oversized.len().to_string())
        .body(Body::from(oversized))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn audit_events_require_the_audit_view_permission() {
    let llm = spawn_mock_llm().await;
    let app = test_app(test_config(llm)).await;
    let (_, login_body) = login(&app, "admin", "SecurePassword123!").await;
    let access_token = login_body["access_token"].as_str().unwrap();

    // The seeded demo account is Admin, which carries every permission
    // including audit-view, so this should succeed.
    let req = Request::builder()
        .method(Method::GET)
        .uri("/api/v1/audit/events")
        .header(header::HOST, "localhost")
        .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // No token at all is unauthorized before the permission check even runs.
    let anon = Request::builder()
        .method(Method::GET)
        .uri("/api/v1/audit/events")
        .header(header::HOST, "localhost")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(anon).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_the_token_so_a_second_use_is_unauthorized() {
    let llm = spawn_mock_llm().await;
    let app = test_app(test_config(llm)).await;
    let (_, login_body) = login(&app, "admin", "SecurePassword123!").await;
    let access_token = login_body["access_token"].as_str().unwrap().to_string();

    let logout_req = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/auth/logout")
        .header(header::HOST, "localhost")
        .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(logout_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let reuse = Request::builder()
        .method(Method::GET)
        .uri("/api/v1/audit/events")
        .header(header::HOST, "localhost")
        .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(reuse).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
