//! `GET /api/v1/audit/events` (§6): queries the hash-chained audit log,
//! itself logging a `compliance.audit.accessed` event so that reading the
//! trail is traceable too.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use gateway_audit::{Actor, AuditEvent, EventType, NewEvent, Outcome, Severity};
use gateway_auth::Permission;
use serde::{Deserialize, Serialize};

use super::ApiResult;
use crate::error::GatewayError;
use crate::middleware::AuthContext;
use crate::state::AppState;

const MAX_LIMIT: usize = 1000;
const DEFAULT_LIMIT: usize = 100;

#[derive(Deserialize)]
pub struct AuditQueryParams {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub event_type: Option<String>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

#[derive(Serialize)]
pub struct AuditQueryResponse {
    pub events: Vec<AuditEvent>,
    pub count: usize,
    pub query_time: DateTime<Utc>,
}

fn parse_event_type(raw: &str) -> Result<EventType, GatewayError> {
    ALL_EVENT_TYPES
        .iter()
        .find(|(name, _)| *name == raw)
        .map(|(_, ty)| *ty)
        .ok_or_else(|| GatewayError::Validation(format!("unknown event_type '{raw}'")))
}

const ALL_EVENT_TYPES: &[(&str, EventType)] = &[
    ("auth.login.success", EventType::AuthLoginSuccess),
    ("auth.login.failure", EventType::AuthLoginFailure),
    ("auth.logout", EventType::AuthLogout),
    ("auth.session.created", EventType::AuthSessionCreated),
    ("auth.session.expired", EventType::AuthSessionExpired),
    ("auth.password.changed", EventType::AuthPasswordChanged),
    ("auth.mfa.enabled", EventType::AuthMfaEnabled),
    ("auth.mfa.disabled", EventType::AuthMfaDisabled),
    ("data.read", EventType::DataRead),
    ("data.write", EventType::DataWrite),
    ("data.delete", EventType::DataDelete),
    ("data.query.executed", EventType::DataQueryExecuted),
    ("data.export", EventType::DataExport),
    ("system.config.changed", EventType::SystemConfigChanged),
    ("system.service.started", EventType::SystemServiceStarted),
    ("system.service.stopped", EventType::SystemServiceStopped),
    ("system.error", EventType::SystemError),
    ("system.security.alert", EventType::SystemSecurityAlert),
    ("compliance.gdpr.consent.given", EventType::ComplianceGdprConsentGiven),
    ("compliance.gdpr.consent.withdrawn", EventType::ComplianceGdprConsentWithdrawn),
    ("compliance.gdpr.data.requested", EventType::ComplianceGdprDataRequested),
    ("compliance.gdpr.data.deleted", EventType::ComplianceGdprDataDeleted),
    ("compliance.audit.accessed", EventType::ComplianceAuditAccessed),
    ("user.created", EventType::UserCreated),
    ("user.updated", EventType::UserUpdated),
    ("user.deleted", EventType::UserDeleted),
    ("user.role.assigned", EventType::UserRoleAssigned),
    ("user.role.revoked", EventType::UserRoleRevoked),
];

pub async fn query_events(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Query(params): Query<AuditQueryParams>,
) -> ApiResult<AuditQueryResponse> {
    if !auth.has_permission(Permission::AuditView) {
        return Err(GatewayError::Auth(gateway_auth::AuthError::Forbidden));
    }

    let event_type = params.event_type.as_deref().map(parse_event_type).transpose()?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

    let events = state.audit.query(
        params.start_date,
        params.end_date,
        event_type,
        params.user_id.as_deref(),
        None,
        limit,
        params.offset.unwrap_or(0),
    );

    state.audit.log_event(
        EventType::ComplianceAuditAccessed,
        "audit logs queried",
        Outcome::Success,
        Severity::Info,
        NewEvent {
            actor: Actor { user_id: Some(auth.user_id.as_str().to_string()), ..Default::default() },
            detail: serde_json::json!({ "event_type": params.event_type, "limit": limit }),
            ..Default::default()
        },
    );

    let count = events.len();
    Ok(Json(AuditQueryResponse { events, count, query_time: state.now() }))
}
