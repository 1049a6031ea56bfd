//! Router assembly (§4.8). Middleware stack, outermost first: response id
//! stamp → trusted-host allowlist → CORS → security headers → body-size
//! cap + content-type whitelist → rate limiter → (per-handler
//! authenticator) → handler → audit wrapper.
//!
//! `axum::Router::layer` makes each subsequent call the new outermost
//! wrapper, so layers below are added innermost-first. `/internal/metrics`
//! is merged in after the CORS layer so it is reachable but never
//! CORS-exposed, while still picking up the host/security/response-id
//! layers that apply to everything.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers;
use crate::middleware::{audit_wrapper, body_limit, rate_limit, response_id, security_headers, trusted_host};
use crate::state::AppState;

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

fn cors_layer(allowed_origins: Vec<String>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            origin.to_str().map(|s| allowed_origins.iter().any(|allowed| allowed == s)).unwrap_or(false)
        }))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health))
        .route("/api/v1/health", get(handlers::health::health))
        .route("/api/chat", post(handlers::chat::chat))
        .route("/api/v1/chat", post(handlers::chat::chat))
        .route("/api/powerbi/axia/query", post(handlers::query::query))
        .route("/api/v1/powerbi/query", post(handlers::query::query))
        .route("/api/powerbi/axia/query/natural", post(handlers::query::query_natural))
        .route("/api/powerbi/axia/refresh", post(handlers::query::refresh))
        .route("/api/v1/auth/login", post(handlers::auth::login))
        .route("/api/v1/auth/logout", post(handlers::auth::logout))
        .route("/api/v1/auth/refresh", post(handlers::auth::refresh))
        .route(
            "/api/v1/privacy/user-data",
            get(handlers::privacy::get_user_data).delete(handlers::privacy::delete_user_data),
        )
        .route("/api/v1/privacy/consent", post(handlers::privacy::manage_consent))
        .route("/api/v1/audit/events", get(handlers::audit::query_events))
        .route("/api/v1/compliance/report/{report_type}", get(handlers::compliance::report))
        .route("/ws/chat", get(handlers::ws::upgrade))
        .route("/api/v1/workflows", get(handlers::workflows::list))
        .route("/api/v1/workflows/{id}/trigger", post(handlers::workflows::trigger))
        .route("/api/v1/workflows/callback", post(handlers::workflows::callback))
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(state.config.cors_origins.clone());

    let api = api_routes()
        .layer(axum::middleware::from_fn_with_state(state.clone(), audit_wrapper::audit_wrapper))
        .layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit::rate_limit))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(axum::middleware::from_fn(body_limit::content_type_whitelist))
        .layer(axum::middleware::from_fn(security_headers::security_headers))
        .layer(cors);

    let internal = Router::new().route("/internal/metrics", get(handlers::metrics::metrics));

    Router::new()
        .merge(api)
        .merge(internal)
        .layer(axum::middleware::from_fn_with_state(state.clone(), trusted_host::trusted_host))
        .layer(axum::middleware::from_fn(response_id::stamp_response_id))
        .with_state(state)
}
