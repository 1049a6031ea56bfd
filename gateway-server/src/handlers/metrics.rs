//! `GET /internal/metrics` (§6): router/cache/fabric/workflow counters for
//! operators. Nested outside the CORS layer in `routes.rs` since this
//! surface is internal-only.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct RouterMetrics {
    pub served_requests: u64,
    pub baseline_cost: f64,
    pub actual_cost: f64,
    pub savings_ratio: Option<f64>,
    pub fallback_count: u64,
}

#[derive(Serialize)]
pub struct FabricMetrics {
    pub active_connections: usize,
}

#[derive(Serialize)]
pub struct WorkflowMetricsBody {
    pub started: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub active_executions: i64,
    pub scheduled_definitions: u64,
    pub success_rate: Option<f64>,
    pub average_duration_ms: Option<f64>,
}

#[derive(Serialize)]
pub struct InternalMetrics {
    pub router: RouterMetrics,
    pub fabric: FabricMetrics,
    pub workflows: WorkflowMetricsBody,
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Json<InternalMetrics> {
    let cost = state.router.cost();
    let workflow_snapshot = state.workflows.metrics_snapshot();

    Json(InternalMetrics {
        router: RouterMetrics {
            served_requests: cost.served_requests(),
            baseline_cost: cost.baseline_cost(),
            actual_cost: cost.actual_cost(),
            savings_ratio: cost.savings_ratio(),
            fallback_count: state.router.fallback_count(),
        },
        fabric: FabricMetrics { active_connections: state.fabric.connection_count() },
        workflows: WorkflowMetricsBody {
            started: workflow_snapshot.started,
            succeeded: workflow_snapshot.succeeded,
            failed: workflow_snapshot.failed,
            active_executions: workflow_snapshot.active_executions,
            scheduled_definitions: workflow_snapshot.scheduled_definitions,
            success_rate: workflow_snapshot.success_rate,
            average_duration_ms: workflow_snapshot.average_duration_ms,
        },
    })
}
