//! `GET`/`DELETE /api/v1/privacy/user-data` and `POST
//! /api/v1/privacy/consent` (§6): the GDPR subject-access, erasure, and
//! consent routes, grounded on the original service's `get_user_data` /
//! `delete_user_data` / `manage_consent` handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use gateway_audit::{Actor, AuditEvent, EventType, NewEvent, Outcome, Severity};
use serde::{Deserialize, Serialize};

use super::ApiResult;
use crate::error::GatewayError;
use crate::middleware::AuthContext;
use crate::state::AppState;

#[derive(Serialize)]
pub struct UserDataExport {
    pub user_id: String,
    pub roles: Vec<&'static str>,
    pub audit_events: Vec<AuditEvent>,
}

pub async fn get_user_data(State(state): State<Arc<AppState>>, auth: AuthContext) -> ApiResult<UserDataExport> {
    let audit_events = state.audit.query(None, None, None, Some(auth.user_id.as_str()), None, 1000, 0);

    state.audit.log_event(
        EventType::ComplianceGdprDataRequested,
        "user data export requested",
        Outcome::Success,
        Severity::Info,
        NewEvent {
            actor: Actor { user_id: Some(auth.user_id.as_str().to_string()), ..Default::default() },
            compliance_tags: vec!["gdpr".to_string(), "data_subject_request".to_string()],
            ..Default::default()
        },
    );

    Ok(Json(UserDataExport {
        user_id: auth.user_id.as_str().to_string(),
        roles: auth.roles.iter().map(|r| r.as_str()).collect(),
        audit_events,
    }))
}

#[derive(Deserialize)]
pub struct DeleteUserDataQuery {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Serialize)]
pub struct DeleteUserDataResponse {
    pub message: &'static str,
    pub status: &'static str,
}

/// Right-to-erasure: terminates every session the caller holds. The
/// gateway keeps no durable conversation store of its own (§1 Non-goals),
/// so session teardown is the entire erasure surface here.
pub async fn delete_user_data(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Query(params): Query<DeleteUserDataQuery>,
) -> ApiResult<DeleteUserDataResponse> {
    if !params.confirm {
        return Err(GatewayError::Validation("deletion not confirmed".to_string()));
    }

    state.auth.terminate_all_sessions(&auth.user_id);

    state.audit.log_event(
        EventType::ComplianceGdprDataDeleted,
        "user data deleted (right to be forgotten)",
        Outcome::Success,
        Severity::High,
        NewEvent {
            actor: Actor { user_id: Some(auth.user_id.as_str().to_string()), ..Default::default() },
            compliance_tags: vec!["gdpr".to_string(), "right_to_erasure".to_string()],
            ..Default::default()
        },
    );

    Ok(Json(DeleteUserDataResponse { message: "user data deletion initiated", status: "success" }))
}

#[derive(Deserialize)]
pub struct ConsentRequest {
    pub consent_type: String,
    pub granted: bool,
}

#[derive(Serialize)]
pub struct ConsentResponse {
    pub consent_type: String,
    pub granted: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

const VALID_CONSENT_TYPES: [&str; 3] = ["marketing", "analytics", "cookies"];

pub async fn manage_consent(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Json(body): Json<ConsentRequest>,
) -> ApiResult<ConsentResponse> {
    if !VALID_CONSENT_TYPES.contains(&body.consent_type.as_str()) {
        return Err(GatewayError::Validation(format!(
            "consent_type must be one of {VALID_CONSENT_TYPES:?}"
        )));
    }

    let event_type =
        if body.granted { EventType::ComplianceGdprConsentGiven } else { EventType::ComplianceGdprConsentWithdrawn };
    let verb = if body.granted { "granted" } else { "withdrawn" };

    state.audit.log_event(
        event_type,
        format!("consent {verb} for {}", body.consent_type),
        Outcome::Success,
        Severity::Info,
        NewEvent {
            actor: Actor { user_id: Some(auth.user_id.as_str().to_string()), ..Default::default() },
            detail: serde_json::json!({ "consent_type": body.consent_type, "granted": body.granted }),
            compliance_tags: vec!["gdpr".to_string(), "consent_management".to_string()],
            ..Default::default()
        },
    );

    Ok(Json(ConsentResponse { consent_type: body.consent_type, granted: body.granted, timestamp: state.now() }))
}
