use std::time::Duration;

use async_trait::async_trait;
use gateway_core::ExecutionId;
use serde_json::Value;

use crate::error::WorkflowError;

/// Default outbound call timeout (§5: "every outbound call carries a 30s
/// default timeout").
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// What the external workflow service told us, synchronously.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// 2xx with a body: the execution finished inline.
    Completed(Value),
    /// 202: the service will call back on `callback_url` later.
    Accepted,
}

/// Dispatches one execution to the external workflow service. Mirrors the
/// `LlmClient` seam in gateway-router — same shape, different upstream.
#[async_trait]
pub trait WorkflowClient: Send + Sync {
    async fn dispatch(
        &self,
        execution_id: &ExecutionId,
        callback_url: &str,
        payload: &Value,
    ) -> Result<DispatchOutcome, WorkflowError>;
}

pub struct HttpWorkflowClient {
    http: reqwest::Client,
    service_url: String,
}

impl HttpWorkflowClient {
    pub fn new(service_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build().expect("reqwest client build"),
            service_url: service_url.into(),
        }
    }
}

#[async_trait]
impl WorkflowClient for HttpWorkflowClient {
    async fn dispatch(
        &self,
        execution_id: &ExecutionId,
        callback_url: &str,
        payload: &Value,
    ) -> Result<DispatchOutcome, WorkflowError> {
        let body = serde_json::json!({
            "execution_id": execution_id.as_str(),
            "callback_url": callback_url,
            "payload": payload,
        });

        let response = self
            .http
            .post(&self.service_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { WorkflowError::Timeout } else { WorkflowError::DependencyFailure(e.to_string()) })?;

        let status = response.status();
        if status.as_u16() == 202 {
            return Ok(DispatchOutcome::Accepted);
        }
        if !status.is_success() {
            return Err(WorkflowError::DependencyFailure(format!("workflow service returned {status}")));
        }

        let parsed: Value = response.json().await.map_err(|e| WorkflowError::DependencyFailure(e.to_string()))?;
        Ok(DispatchOutcome::Completed(parsed))
    }
}
