use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{AuditEvent, EventType, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComplianceStandard {
    Soc2,
    Iso27001,
    Gdpr,
}

/// Compliance summary over a requested window (§4.4). All fields beyond
/// `integrity_verified` are derived from the queried window, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub standard: ComplianceStandard,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub total_events: usize,
    pub login_attempts: usize,
    pub failed_logins: usize,
    pub data_access_events: usize,
    pub security_alerts: usize,
    pub configuration_changes: usize,
    pub gdpr_events: usize,
    pub events_by_severity: BTreeMap<String, usize>,
    pub integrity_verified: bool,
}

pub fn build_report(
    standard: ComplianceStandard,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    events: &[AuditEvent],
    integrity_verified: bool,
) -> ComplianceReport {
    let login_attempts = events
        .iter()
        .filter(|e| matches!(e.event_type, EventType::AuthLoginSuccess | EventType::AuthLoginFailure))
        .count();
    let failed_logins = events.iter().filter(|e| e.event_type == EventType::AuthLoginFailure).count();
    let data_access_events = events.iter().filter(|e| e.event_type.is_data_access()).count();
    let security_alerts = events.iter().filter(|e| e.event_type == EventType::SystemSecurityAlert).count();
    let configuration_changes = events
        .iter()
        .filter(|e| {
            matches!(
                e.event_type,
                EventType::SystemConfigChanged
                    | EventType::SystemServiceStarted
                    | EventType::SystemServiceStopped
            )
        })
        .count();
    let gdpr_events = events.iter().filter(|e| e.event_type.is_gdpr()).count();

    let mut by_severity: HashMap<Severity, usize> = HashMap::new();
    for event in events {
        *by_severity.entry(event.severity).or_insert(0) += 1;
    }
    let events_by_severity = by_severity
        .into_iter()
        .map(|(severity, count)| (format!("{severity:?}").to_lowercase(), count))
        .collect();

    ComplianceReport {
        standard,
        window_start,
        window_end,
        total_events: events.len(),
        login_attempts,
        failed_logins,
        data_access_events,
        security_alerts,
        configuration_changes,
        gdpr_events,
        events_by_severity,
        integrity_verified,
    }
}
