//! `GET /api/v1/workflows`, `POST /api/v1/workflows/{id}/trigger`, and the
//! signed `POST /api/v1/workflows/callback` webhook (§6). The callback
//! route is the one handler in this crate that never goes through
//! `AuthContext` — it authenticates via `gateway_workflow`'s HMAC
//! signature instead, the way the original service's webhook ingestion
//! trusts a shared secret rather than a caller's session.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use gateway_auth::Permission;
use gateway_core::WorkflowId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ApiResult;
use crate::error::GatewayError;
use crate::middleware::AuthContext;
use crate::state::AppState;

#[derive(Serialize)]
pub struct WorkflowSummary {
    pub id: String,
    pub name: String,
}

pub async fn list(State(state): State<Arc<AppState>>, auth: AuthContext) -> ApiResult<Vec<WorkflowSummary>> {
    if !auth.has_permission(Permission::Execute) {
        return Err(GatewayError::Auth(gateway_auth::AuthError::Forbidden));
    }
    let summaries = state
        .workflows
        .list_definitions()
        .into_iter()
        .map(|d| WorkflowSummary { id: d.id.as_str().to_string(), name: d.name })
        .collect();
    Ok(Json(summaries))
}

#[derive(Deserialize, Default)]
pub struct TriggerRequest {
    #[serde(default)]
    pub payload: Value,
}

#[derive(Serialize)]
pub struct TriggerResponse {
    pub execution_id: String,
}

pub async fn trigger(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(body): Json<TriggerRequest>,
) -> ApiResult<TriggerResponse> {
    if !auth.has_permission(Permission::Execute) {
        return Err(GatewayError::Auth(gateway_auth::AuthError::Forbidden));
    }
    let execution_id = state.workflows.trigger_manual(WorkflowId::from(id), body.payload).await?;
    Ok(Json(TriggerResponse { execution_id: execution_id.as_str().to_string() }))
}

/// Timestamp and signature travel as headers, the body is read raw so the
/// signature can be verified over the exact bytes that were sent.
pub async fn callback(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Result<StatusCode, GatewayError> {
    let signature = headers
        .get("x-workflow-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| GatewayError::Validation("missing x-workflow-signature header".to_string()))?;
    let timestamp: chrono::DateTime<chrono::Utc> = headers
        .get("x-workflow-timestamp")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| GatewayError::Validation("missing or malformed x-workflow-timestamp header".to_string()))?;

    state.workflows.handle_callback(signature, timestamp, &body, state.now()).await?;
    Ok(StatusCode::NO_CONTENT)
}
