//! Trusted-host allowlist (§4.8): requests whose `Host` header doesn't
//! match a configured allowed host are refused before anything past this
//! layer runs. Only `response_id` wraps outside it, so a rejected request
//! still gets an `x-request-id` header.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

pub async fn trusted_host(State(state): State<Arc<AppState>>, req: Request<axum::body::Body>, next: Next) -> Response {
    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(|h| h.split(':').next().unwrap_or(h))
        .unwrap_or("");

    let allowed = state.config.allowed_hosts.iter().any(|h| h == host) || host.is_empty();
    if allowed {
        next.run(req).await
    } else {
        (StatusCode::FORBIDDEN, "host not allowed").into_response()
    }
}
