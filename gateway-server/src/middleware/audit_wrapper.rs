//! Catch-all audit wrapper (§4.8, outermost-but-one layer before the
//! response id stamp): any response that comes back a server fault gets a
//! `system.error` audit entry at `high` severity, mirroring the original
//! service's `http_exception_handler` for `status_code >= 500`. Handlers
//! still log their own domain-specific events (login, GDPR export, audit
//! access); this only catches what they didn't.

use std::sync::Arc;

use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use gateway_audit::{EventType, NewEvent, Outcome, Severity};

use crate::state::AppState;

pub async fn audit_wrapper(State(state): State<Arc<AppState>>, req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;
    let status = response.status();

    if status.is_server_error() {
        state.audit.log_event(
            EventType::SystemError,
            format!("{method} {path} returned {status}"),
            Outcome::Error,
            Severity::High,
            NewEvent::default(),
        );
    }

    response
}
