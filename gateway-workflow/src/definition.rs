use gateway_core::WorkflowId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const RETRY_BACKOFF_BASE_SECS: i64 = 60;

/// How an execution of this definition comes to be enqueued (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerType {
    Manual,
    Scheduled { cron_expression: String },
    Event { subscription_key: String },
}

/// A registered workflow. Definitions are read-heavy and rarely change once
/// loaded (§5 shared-resource policy).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: WorkflowId,
    pub name: String,
    pub trigger: TriggerType,
    pub retry_on_failure: bool,
    pub max_retries: u32,
    pub payload_template: Value,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>, trigger: TriggerType) -> Self {
        Self {
            id: WorkflowId::generate(),
            name: name.into(),
            trigger,
            retry_on_failure: true,
            max_retries: DEFAULT_MAX_RETRIES,
            payload_template: Value::Null,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn without_retry(mut self) -> Self {
        self.retry_on_failure = false;
        self
    }
}
