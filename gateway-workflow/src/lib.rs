//! Workflow definitions, triggers (manual, scheduled, event), retrying
//! execution lifecycle, and signed callback ingestion for the
//! conversational analytics gateway.

pub mod client;
pub mod definition;
pub mod error;
pub mod execution;
pub mod metrics;
pub mod schedule;
pub mod signature;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use gateway_core::clock::Clock;
use gateway_core::ids::{ExecutionId, WorkflowId};
use serde_json::Value;

pub use client::{DispatchOutcome, HttpWorkflowClient, WorkflowClient};
pub use definition::{TriggerType, WorkflowDefinition, DEFAULT_MAX_RETRIES, RETRY_BACKOFF_BASE_SECS};
pub use error::WorkflowError;
pub use execution::{ExecutionStatus, WorkflowExecution};
pub use metrics::{MetricsSnapshot, WorkflowMetrics};
pub use schedule::CronSchedule;

use signature::verify_signature;

/// Upper bound on retry backoff regardless of how many attempts have
/// elapsed (§4.7: "linear backoff with a configurable ceiling").
pub const DEFAULT_RETRY_BACKOFF_CEILING: chrono::Duration = chrono::Duration::minutes(30);

/// The fan-out key used when an execution permanently fails, so other
/// definitions can subscribe to failure notifications (§8 scenario 5).
pub const WORKFLOW_FAILED_EVENT: &str = "workflow_failed";

/// Ties definitions, the cron scheduler, event subscriptions, execution
/// state, and the external-service client together behind one entry point.
pub struct WorkflowOrchestrator<C: Clock, W: WorkflowClient> {
    clock: Arc<C>,
    client: Arc<W>,
    definitions: DashMap<WorkflowId, WorkflowDefinition>,
    schedules: DashMap<WorkflowId, CronSchedule>,
    subscriptions: DashMap<String, Vec<WorkflowId>>,
    executions: DashMap<ExecutionId, WorkflowExecution>,
    metrics: WorkflowMetrics,
    signing_key: Vec<u8>,
    callback_base_url: String,
    retry_backoff_ceiling: chrono::Duration,
}

impl<C: Clock, W: WorkflowClient> WorkflowOrchestrator<C, W> {
    pub fn new(clock: Arc<C>, client: Arc<W>, signing_key: impl Into<Vec<u8>>, callback_base_url: impl Into<String>) -> Self {
        Self {
            clock,
            client,
            definitions: DashMap::new(),
            schedules: DashMap::new(),
            subscriptions: DashMap::new(),
            executions: DashMap::new(),
            metrics: WorkflowMetrics::default(),
            signing_key: signing_key.into(),
            callback_base_url: callback_base_url.into(),
            retry_backoff_ceiling: DEFAULT_RETRY_BACKOFF_CEILING,
        }
    }

    pub fn with_retry_backoff_ceiling(mut self, ceiling: chrono::Duration) -> Self {
        self.retry_backoff_ceiling = ceiling;
        self
    }

    /// Registers a definition, indexing it by cron schedule or subscription
    /// key as its trigger requires. Malformed cron expressions are dropped
    /// silently from the scheduler index; the definition still registers so
    /// it remains manually triggerable.
    pub fn register_definition(&self, definition: WorkflowDefinition) {
        match &definition.trigger {
            TriggerType::Scheduled { cron_expression } => {
                if let Ok(schedule) = CronSchedule::parse(cron_expression) {
                    self.schedules.insert(definition.id.clone(), schedule);
                }
            }
            TriggerType::Event { subscription_key } => {
                self.subscriptions.entry(subscription_key.clone()).or_default().push(definition.id.clone());
            }
            TriggerType::Manual => {}
        }
        self.definitions.insert(definition.id.clone(), definition);
        self.metrics.set_scheduled_definitions(self.schedules.len() as u64);
    }

    pub fn definition(&self, id: &WorkflowId) -> Option<WorkflowDefinition> {
        self.definitions.get(id).map(|d| d.clone())
    }

    pub fn list_definitions(&self) -> Vec<WorkflowDefinition> {
        self.definitions.iter().map(|e| e.value().clone()).collect()
    }

    pub fn execution(&self, id: &ExecutionId) -> Option<WorkflowExecution> {
        self.executions.get(id).map(|e| e.clone())
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub async fn trigger_manual(&self, definition_id: WorkflowId, payload: Value) -> Result<ExecutionId, WorkflowError> {
        let now = self.clock.now();
        self.start_new_execution(definition_id, payload, now).await
    }

    /// Evaluated once per minute by the host server's scheduler task (§4.7).
    pub async fn evaluate_schedules(&self, now: DateTime<Utc>) -> Vec<ExecutionId> {
        let due: Vec<WorkflowId> =
            self.schedules.iter().filter(|entry| entry.value().is_due(now)).map(|entry| entry.key().clone()).collect();

        let mut started = Vec::new();
        for definition_id in due {
            let payload = self.definitions.get(&definition_id).map(|d| d.payload_template.clone()).unwrap_or(Value::Null);
            if let Ok(execution_id) = self.start_new_execution(definition_id, payload, now).await {
                started.push(execution_id);
            }
        }
        started
    }

    /// Fans an event payload out to every definition subscribed to the
    /// given key (§4.7 change/event trigger).
    pub async fn trigger_event(&self, subscription_key: &str, payload: Value) -> Vec<ExecutionId> {
        let now = self.clock.now();
        let subscribers = self.subscriptions.get(subscription_key).map(|v| v.clone()).unwrap_or_default();

        let mut started = Vec::new();
        for definition_id in subscribers {
            if let Ok(execution_id) = self.start_new_execution(definition_id, payload.clone(), now).await {
                started.push(execution_id);
            }
        }
        started
    }

    /// Re-enters `running` every execution whose retry backoff has elapsed
    /// (§4.7). Driven by a periodic task in the host server.
    pub async fn poll_retries(&self, now: DateTime<Utc>) -> Vec<ExecutionId> {
        let due: Vec<ExecutionId> = self
            .executions
            .iter()
            .filter(|entry| entry.value().status == ExecutionStatus::Retrying && entry.value().retry_at.is_some_and(|t| t <= now))
            .map(|entry| entry.key().clone())
            .collect();

        for execution_id in &due {
            let _ = self.dispatch_and_update(execution_id.clone(), now).await;
        }
        due
    }

    /// Verifies and applies a signed callback from the external workflow
    /// service (§4.7).
    pub async fn handle_callback(
        &self,
        signature_hex: &str,
        timestamp: DateTime<Utc>,
        raw_body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        verify_signature(&self.signing_key, timestamp, raw_body, signature_hex, now)?;

        let payload: Value = serde_json::from_slice(raw_body).map_err(|e| WorkflowError::DependencyFailure(e.to_string()))?;
        let execution_id: ExecutionId = payload
            .get("execution_id")
            .and_then(Value::as_str)
            .map(|s| ExecutionId::from(s.to_string()))
            .ok_or_else(|| WorkflowError::DependencyFailure("callback missing execution_id".to_string()))?;

        let succeeded = payload.get("status").and_then(Value::as_str) == Some("completed");
        if succeeded {
            let result = payload.get("result").cloned().unwrap_or(Value::Null);
            self.finish_success(&execution_id, result, now);
            return Ok(());
        }

        let (definition_id, retry_count) = match self.executions.get(&execution_id) {
            Some(entry) => (entry.definition_id.clone(), entry.retry_count),
            None => return Err(WorkflowError::ExecutionNotFound(execution_id.to_string())),
        };
        let error_message = payload
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("workflow service reported failure")
            .to_string();
        self.handle_failure(&execution_id, &definition_id, retry_count, error_message, now).await;
        Ok(())
    }

    async fn start_new_execution(
        &self,
        definition_id: WorkflowId,
        payload: Value,
        now: DateTime<Utc>,
    ) -> Result<ExecutionId, WorkflowError> {
        if !self.definitions.contains_key(&definition_id) {
            return Err(WorkflowError::DefinitionNotFound(definition_id.to_string()));
        }

        let execution = WorkflowExecution::new(definition_id, payload, now);
        let execution_id = execution.execution_id.clone();
        self.executions.insert(execution_id.clone(), execution);
        self.metrics.record_started();

        let _ = self.dispatch_and_update(execution_id.clone(), now).await;
        Ok(execution_id)
    }

    async fn dispatch_and_update(&self, execution_id: ExecutionId, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        let (definition_id, payload, retry_count) = {
            let mut entry = self
                .executions
                .get_mut(&execution_id)
                .ok_or_else(|| WorkflowError::ExecutionNotFound(execution_id.to_string()))?;
            entry.status = ExecutionStatus::Running;
            entry.updated_at = now;
            (entry.definition_id.clone(), entry.payload.clone(), entry.retry_count)
        };

        let callback_url = format!("{}/api/v1/workflows/callback?execution_id={}", self.callback_base_url, execution_id.as_str());
        let outcome = self.client.dispatch(&execution_id, &callback_url, &payload).await;

        match outcome {
            Ok(DispatchOutcome::Completed(result)) => {
                self.finish_success(&execution_id, result, now);
                Ok(())
            }
            Ok(DispatchOutcome::Accepted) => Ok(()),
            Err(e) => {
                self.handle_failure(&execution_id, &definition_id, retry_count, e.to_string(), now).await;
                Err(e)
            }
        }
    }

    fn finish_success(&self, execution_id: &ExecutionId, result: Value, now: DateTime<Utc>) {
        if let Some(mut entry) = self.executions.get_mut(execution_id) {
            let duration_ms = (now - entry.created_at).num_milliseconds().max(0) as u64;
            entry.status = ExecutionStatus::Completed;
            entry.result = Some(result);
            entry.updated_at = now;
            drop(entry);
            self.metrics.record_succeeded(duration_ms);
        }
    }

    /// On a retriable failure, moves the execution to `retrying` with a
    /// linear backoff (`60 × retry_count`, clamped to the ceiling); once
    /// retries are exhausted, marks it `failed` and fans a
    /// [`WORKFLOW_FAILED_EVENT`] out to any subscribers (§8 scenario 5).
    async fn handle_failure(&self, execution_id: &ExecutionId, definition_id: &WorkflowId, retry_count: u32, error: String, now: DateTime<Utc>) {
        let (retry_on_failure, max_retries) =
            self.definitions.get(definition_id).map(|d| (d.retry_on_failure, d.max_retries)).unwrap_or((false, 0));

        let mut exhausted = false;
        let mut duration_ms = 0u64;
        if let Some(mut entry) = self.executions.get_mut(execution_id) {
            entry.error = Some(error.clone());
            entry.updated_at = now;

            if retry_on_failure && retry_count < max_retries {
                entry.retry_count = retry_count + 1;
                let backoff = chrono::Duration::seconds(RETRY_BACKOFF_BASE_SECS * entry.retry_count as i64).min(self.retry_backoff_ceiling);
                entry.retry_at = Some(now + backoff);
                entry.status = ExecutionStatus::Retrying;
            } else {
                entry.status = ExecutionStatus::Failed;
                duration_ms = (now - entry.created_at).num_milliseconds().max(0) as u64;
                exhausted = true;
            }
        }

        if exhausted {
            self.metrics.record_failed(duration_ms);
            self.trigger_event(WORKFLOW_FAILED_EVENT, serde_json::json!({ "execution_id": execution_id.as_str(), "error": error })).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gateway_core::clock::FrozenClock;
    use std::sync::Mutex;

    struct ScriptedClient {
        responses: Mutex<Vec<Result<DispatchOutcome, WorkflowError>>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<Result<DispatchOutcome, WorkflowError>>) -> Self {
            Self { responses: Mutex::new(responses) }
        }
    }

    #[async_trait]
    impl WorkflowClient for ScriptedClient {
        async fn dispatch(&self, _execution_id: &ExecutionId, _callback_url: &str, _payload: &Value) -> Result<DispatchOutcome, WorkflowError> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(DispatchOutcome::Completed(Value::Null))
            } else {
                responses.remove(0)
            }
        }
    }

    fn clock_at(epoch_secs: i64) -> Arc<FrozenClock> {
        Arc::new(FrozenClock::at(DateTime::from_timestamp(epoch_secs, 0).unwrap()))
    }

    #[tokio::test]
    async fn manual_trigger_completes_synchronously() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(DispatchOutcome::Completed(serde_json::json!({"rows": 3})))]));
        let orchestrator = WorkflowOrchestrator::new(clock_at(0), client, b"secret".to_vec(), "https://gateway.example.com");
        let def = WorkflowDefinition::new("refresh", TriggerType::Manual);
        let def_id = def.id.clone();
        orchestrator.register_definition(def);

        let execution_id = orchestrator.trigger_manual(def_id, Value::Null).await.unwrap();
        let execution = orchestrator.execution(&execution_id).unwrap();

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(orchestrator.metrics_snapshot().succeeded, 1);
    }

    #[tokio::test]
    async fn scheduled_definition_runs_only_when_due() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(DispatchOutcome::Completed(Value::Null))]));
        let orchestrator = WorkflowOrchestrator::new(clock_at(0), client, b"secret".to_vec(), "https://gateway.example.com");
        orchestrator.register_definition(WorkflowDefinition::new(
            "midnight-refresh",
            TriggerType::Scheduled { cron_expression: "0 0 * * *".to_string() },
        ));

        let not_due = orchestrator.evaluate_schedules(DateTime::from_timestamp(300, 0).unwrap()).await;
        assert!(not_due.is_empty());

        let due = orchestrator.evaluate_schedules(DateTime::from_timestamp(0, 0).unwrap()).await;
        assert_eq!(due.len(), 1);
    }

    #[tokio::test]
    async fn event_trigger_fans_out_to_every_subscriber() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(DispatchOutcome::Completed(Value::Null)),
            Ok(DispatchOutcome::Completed(Value::Null)),
        ]));
        let orchestrator = WorkflowOrchestrator::new(clock_at(0), client, b"secret".to_vec(), "https://gateway.example.com");
        orchestrator.register_definition(WorkflowDefinition::new(
            "notify-a",
            TriggerType::Event { subscription_key: "dataset.refreshed".to_string() },
        ));
        orchestrator.register_definition(WorkflowDefinition::new(
            "notify-b",
            TriggerType::Event { subscription_key: "dataset.refreshed".to_string() },
        ));

        let started = orchestrator.trigger_event("dataset.refreshed", serde_json::json!({"dataset": "sales"})).await;
        assert_eq!(started.len(), 2);
    }

    #[tokio::test]
    async fn failure_with_retries_remaining_schedules_a_retry() {
        let client = Arc::new(ScriptedClient::new(vec![Err(WorkflowError::DependencyFailure("500".to_string()))]));
        let clock = clock_at(0);
        let orchestrator = WorkflowOrchestrator::new(clock.clone(), client, b"secret".to_vec(), "https://gateway.example.com");
        let def = WorkflowDefinition::new("flaky-refresh", TriggerType::Manual);
        let def_id = def.id.clone();
        orchestrator.register_definition(def);

        let execution_id = orchestrator.trigger_manual(def_id, Value::Null).await.unwrap();
        let execution = orchestrator.execution(&execution_id).unwrap();

        assert_eq!(execution.status, ExecutionStatus::Retrying);
        assert_eq!(execution.retry_count, 1);
        assert_eq!(execution.retry_at, Some(clock.now() + chrono::Duration::seconds(60)));
    }

    #[tokio::test]
    async fn exhausting_retries_fails_and_fans_out_workflow_failed() {
        let client = Arc::new(ScriptedClient::new(vec![
            Err(WorkflowError::DependencyFailure("500".to_string())),
            Err(WorkflowError::DependencyFailure("500".to_string())),
            Err(WorkflowError::DependencyFailure("500".to_string())),
            Err(WorkflowError::DependencyFailure("500".to_string())),
        ]));
        let clock = clock_at(0);
        let orchestrator = Arc::new(WorkflowOrchestrator::new(clock.clone(), client, b"secret".to_vec(), "https://gateway.example.com"));

        let flaky = WorkflowDefinition::new("flaky-refresh", TriggerType::Manual).with_max_retries(3);
        let flaky_id = flaky.id.clone();
        orchestrator.register_definition(flaky);
        orchestrator.register_definition(WorkflowDefinition::new(
            "alerting",
            TriggerType::Event { subscription_key: WORKFLOW_FAILED_EVENT.to_string() },
        ));

        let execution_id = orchestrator.trigger_manual(flaky_id, Value::Null).await.unwrap();

        for _ in 0..3 {
            let execution = orchestrator.execution(&execution_id).unwrap();
            if execution.status == ExecutionStatus::Failed {
                break;
            }
            let retry_at = execution.retry_at.unwrap();
            clock.advance(retry_at - clock.now());
            orchestrator.poll_retries(clock.now()).await;
        }

        let execution = orchestrator.execution(&execution_id).unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(orchestrator.metrics_snapshot().failed, 1);
    }

    #[tokio::test]
    async fn callback_with_valid_signature_completes_an_async_execution() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(DispatchOutcome::Accepted)]));
        let clock = clock_at(0);
        let orchestrator = WorkflowOrchestrator::new(clock.clone(), client, b"callback-secret".to_vec(), "https://gateway.example.com");
        let def = WorkflowDefinition::new("async-refresh", TriggerType::Manual);
        let def_id = def.id.clone();
        orchestrator.register_definition(def);

        let execution_id = orchestrator.trigger_manual(def_id, Value::Null).await.unwrap();
        assert_eq!(orchestrator.execution(&execution_id).unwrap().status, ExecutionStatus::Running);

        let body = serde_json::json!({"execution_id": execution_id.as_str(), "status": "completed", "result": {"rows": 9}});
        let raw_body = serde_json::to_vec(&body).unwrap();
        let now = clock.now();
        let signature = {
            use hmac::{Hmac, Mac};
            use sha2::Sha256;
            let mut mac = Hmac::<Sha256>::new_from_slice(b"callback-secret").unwrap();
            mac.update(now.timestamp().to_string().as_bytes());
            mac.update(b".");
            mac.update(&raw_body);
            hex::encode(mac.finalize().into_bytes())
        };

        orchestrator.handle_callback(&signature, now, &raw_body, now).await.unwrap();
        assert_eq!(orchestrator.execution(&execution_id).unwrap().status, ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn callback_with_bad_signature_is_rejected_and_leaves_execution_unchanged() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(DispatchOutcome::Accepted)]));
        let clock = clock_at(0);
        let orchestrator = WorkflowOrchestrator::new(clock.clone(), client, b"callback-secret".to_vec(), "https://gateway.example.com");
        let def = WorkflowDefinition::new("async-refresh", TriggerType::Manual);
        let def_id = def.id.clone();
        orchestrator.register_definition(def);
        let execution_id = orchestrator.trigger_manual(def_id, Value::Null).await.unwrap();

        let body = serde_json::json!({"execution_id": execution_id.as_str(), "status": "completed"});
        let raw_body = serde_json::to_vec(&body).unwrap();
        let now = clock.now();

        let result = orchestrator.handle_callback("00", now, &raw_body, now).await;
        assert!(matches!(result, Err(WorkflowError::SignatureInvalid)));
        assert_eq!(orchestrator.execution(&execution_id).unwrap().status, ExecutionStatus::Running);
    }
}
