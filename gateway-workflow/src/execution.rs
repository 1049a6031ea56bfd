use chrono::{DateTime, Utc};
use gateway_core::{ExecutionId, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `pending → running → (completed | failed | timed_out | cancelled)`, with
/// a `retrying` detour back to `running` when retries remain (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Retrying,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::TimedOut | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub execution_id: ExecutionId,
    pub definition_id: WorkflowId,
    pub status: ExecutionStatus,
    pub payload: Value,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set while `status == Retrying`; the execution becomes eligible to
    /// re-enter `running` once this time has passed.
    pub retry_at: Option<DateTime<Utc>>,
}

impl WorkflowExecution {
    pub fn new(definition_id: WorkflowId, payload: Value, now: DateTime<Utc>) -> Self {
        Self {
            execution_id: ExecutionId::generate(),
            definition_id,
            status: ExecutionStatus::Pending,
            payload,
            result: None,
            error: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
            retry_at: None,
        }
    }
}
