use chrono::{DateTime, Utc};
use gateway_core::ids::AuditEventId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stable event type strings (§6). Kept as an exhaustive enum rather than a
/// free string so callers can't log a typo'd type, while `as_str()` still
/// gives the wire-stable form compliance consumers expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    AuthLoginSuccess,
    AuthLoginFailure,
    AuthLogout,
    AuthSessionCreated,
    AuthSessionExpired,
    AuthPasswordChanged,
    AuthMfaEnabled,
    AuthMfaDisabled,
    DataRead,
    DataWrite,
    DataDelete,
    DataQueryExecuted,
    DataExport,
    SystemConfigChanged,
    SystemServiceStarted,
    SystemServiceStopped,
    SystemError,
    SystemSecurityAlert,
    ComplianceGdprConsentGiven,
    ComplianceGdprConsentWithdrawn,
    ComplianceGdprDataRequested,
    ComplianceGdprDataDeleted,
    ComplianceAuditAccessed,
    UserCreated,
    UserUpdated,
    UserDeleted,
    UserRoleAssigned,
    UserRoleRevoked,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::AuthLoginSuccess => "auth.login.success",
            EventType::AuthLoginFailure => "auth.login.failure",
            EventType::AuthLogout => "auth.logout",
            EventType::AuthSessionCreated => "auth.session.created",
            EventType::AuthSessionExpired => "auth.session.expired",
            EventType::AuthPasswordChanged => "auth.password.changed",
            EventType::AuthMfaEnabled => "auth.mfa.enabled",
            EventType::AuthMfaDisabled => "auth.mfa.disabled",
            EventType::DataRead => "data.read",
            EventType::DataWrite => "data.write",
            EventType::DataDelete => "data.delete",
            EventType::DataQueryExecuted => "data.query.executed",
            EventType::DataExport => "data.export",
            EventType::SystemConfigChanged => "system.config.changed",
            EventType::SystemServiceStarted => "system.service.started",
            EventType::SystemServiceStopped => "system.service.stopped",
            EventType::SystemError => "system.error",
            EventType::SystemSecurityAlert => "system.security.alert",
            EventType::ComplianceGdprConsentGiven => "compliance.gdpr.consent.given",
            EventType::ComplianceGdprConsentWithdrawn => "compliance.gdpr.consent.withdrawn",
            EventType::ComplianceGdprDataRequested => "compliance.gdpr.data.requested",
            EventType::ComplianceGdprDataDeleted => "compliance.gdpr.data.deleted",
            EventType::ComplianceAuditAccessed => "compliance.audit.accessed",
            EventType::UserCreated => "user.created",
            EventType::UserUpdated => "user.updated",
            EventType::UserDeleted => "user.deleted",
            EventType::UserRoleAssigned => "user.role.assigned",
            EventType::UserRoleRevoked => "user.role.revoked",
        }
    }

    pub fn is_data_access(&self) -> bool {
        self.as_str().starts_with("data.")
    }

    pub fn is_gdpr(&self) -> bool {
        self.as_str().starts_with("compliance.gdpr")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// High and critical events bypass batching entirely (§4.4 durability tiers).
    pub fn bypasses_batching(&self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
    Error,
}

/// Coarse sensitivity tag attached to every event (§glossary). Not
/// access-control-enforcing on its own — purely a compliance summarization
/// field, defaulting to `Internal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataClassification {
    Public,
    #[default]
    Internal,
    Confidential,
    Restricted,
}

/// Optional identity of whoever triggered the event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub session_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Optional resource the event acted on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subject {
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
}

/// A single audit record (§3 Data model). `hash` is populated by the store
/// at append time, never by the caller — see `AuditLog::log_event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: AuditEventId,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub severity: Severity,
    pub actor: Actor,
    pub subject: Subject,
    pub action: String,
    pub outcome: Outcome,
    pub detail: serde_json::Value,
    pub data_classification: DataClassification,
    pub compliance_tags: Vec<String>,
    pub hash: String,
}

impl AuditEvent {
    /// `H(event_id ‖ timestamp ‖ type ‖ action ‖ outcome ‖ user_id? ‖ previous_h)`,
    /// matching the hash chain invariant in §3/§8.
    pub fn compute_hash(&self, previous_hash: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.event_id.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(self.timestamp.to_rfc3339().as_bytes());
        hasher.update(b":");
        hasher.update(self.event_type.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(self.action.as_bytes());
        hasher.update(b":");
        hasher.update(outcome_str(self.outcome).as_bytes());
        if let Some(user_id) = &self.actor.user_id {
            hasher.update(b":");
            hasher.update(user_id.as_bytes());
        }
        hasher.update(b":");
        hasher.update(previous_hash.as_bytes());
        hex::encode(hasher.finalize())
    }
}

fn outcome_str(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Success => "success",
        Outcome::Failure => "failure",
        Outcome::Error => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_strings_match_stable_wire_form() {
        assert_eq!(EventType::AuthLoginFailure.as_str(), "auth.login.failure");
        assert_eq!(EventType::ComplianceGdprDataDeleted.as_str(), "compliance.gdpr.data.deleted");
    }

    #[test]
    fn data_access_predicate_matches_data_dot_prefix() {
        assert!(EventType::DataQueryExecuted.is_data_access());
        assert!(!EventType::AuthLogout.is_data_access());
    }

    #[test]
    fn high_and_critical_bypass_batching() {
        assert!(Severity::High.bypasses_batching());
        assert!(Severity::Critical.bypasses_batching());
        assert!(!Severity::Medium.bypasses_batching());
    }
}
