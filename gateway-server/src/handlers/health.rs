//! `GET /` and `GET /health` · `/api/v1/health` (§6): a minimal public
//! banner plus a liveness check whose detail expands for authenticated
//! callers, mirroring the original service's root/`health` split.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::http::Request;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct Banner {
    service: &'static str,
    version: &'static str,
}

pub async fn root() -> Json<Banner> {
    Json(Banner { service: "bi-gateway", version: env!("CARGO_PKG_VERSION") })
}

#[derive(Serialize)]
pub struct HealthBody {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    active_connections: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_savings_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fallback_count: Option<u64>,
}

/// Bearer token is optional here: present and valid -> detailed body,
/// otherwise a bare `{"status": "ok"}` (§6: "liveness; detailed only to
/// authenticated callers").
pub async fn health(State(state): State<Arc<AppState>>, req: Request<axum::body::Body>) -> Json<HealthBody> {
    let authenticated = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| state.auth.decode_token(token).is_ok())
        .unwrap_or(false);

    if authenticated {
        Json(HealthBody {
            status: "ok",
            active_connections: Some(state.fabric.connection_count()),
            cache_savings_ratio: state.router.cost().savings_ratio(),
            fallback_count: Some(state.router.fallback_count()),
        })
    } else {
        Json(HealthBody { status: "ok", active_connections: None, cache_savings_ratio: None, fallback_count: None })
    }
}
