//! `GET /api/v1/compliance/report/{SOC2|ISO27001|GDPR}` (§6): restricted to
//! the auditor role, mirroring the original service's
//! `require_role(UserRole.AUDITOR)` guard on `generate_compliance_report`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use gateway_audit::{ComplianceReport, ComplianceStandard};
use gateway_auth::{AuthError, Role};
use serde::Deserialize;

use super::ApiResult;
use crate::error::GatewayError;
use crate::middleware::AuthContext;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ReportWindow {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

fn parse_standard(raw: &str) -> Result<ComplianceStandard, GatewayError> {
    match raw {
        "SOC2" => Ok(ComplianceStandard::Soc2),
        "ISO27001" => Ok(ComplianceStandard::Iso27001),
        "GDPR" => Ok(ComplianceStandard::Gdpr),
        other => Err(GatewayError::Validation(format!("unknown report type '{other}', expected SOC2|ISO27001|GDPR"))),
    }
}

pub async fn report(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(report_type): Path<String>,
    Query(window): Query<ReportWindow>,
) -> ApiResult<ComplianceReport> {
    if !auth.roles.iter().any(|r| matches!(r, Role::Auditor | Role::Admin)) {
        return Err(GatewayError::Auth(AuthError::Forbidden));
    }

    let standard = parse_standard(&report_type)?;
    let report = state.audit.compliance_report(standard, window.start_date, window.end_date);
    Ok(Json(report))
}
