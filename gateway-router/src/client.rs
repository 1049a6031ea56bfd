use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RouterError;
use crate::variant::Variant;

/// Total request timeout (§4.5).
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub variant: Variant,
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
}

/// Seam between the router's selection/cache/accounting logic and the
/// actual LLM backend, the same role `LlmProvider` plays ahead of
/// `CachedProvider` in the wrapping pattern this crate is grounded on.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, RouterError>;
}

/// Talks to a configured HTTP endpoint per variant. Endpoint URLs and API
/// keys come from `GatewayConfig`; this type only knows how to shape and
/// send the request.
pub struct HttpLlmClient {
    http: reqwest::Client,
    endpoint_for: Box<dyn Fn(Variant) -> String + Send + Sync>,
    api_key: String,
}

impl HttpLlmClient {
    pub fn new(endpoint_for: impl Fn(Variant) -> String + Send + Sync + 'static, api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client builds with static config");
        Self { http, endpoint_for, api_key }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, RouterError> {
        let url = (self.endpoint_for)(request.variant);
        let body = serde_json::json!({
            "messages": std::iter::once(serde_json::json!({"role": "system", "content": request.system_prompt}))
                .chain(request.messages.iter().map(|m| serde_json::json!({"role": m.role, "content": m.content})))
                .collect::<Vec<_>>(),
            "max_tokens": request.max_tokens,
        });

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    RouterError::Timeout
                } else {
                    RouterError::Transport(err.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(RouterError::UpstreamStatus { status: response.status().as_u16() });
        }

        #[derive(Deserialize)]
        struct RawChoice {
            message: RawMessage,
        }
        #[derive(Deserialize)]
        struct RawMessage {
            content: String,
        }
        #[derive(Deserialize)]
        struct RawResponse {
            choices: Vec<RawChoice>,
        }

        let parsed: RawResponse = response.json().await.map_err(|err| RouterError::Transport(err.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        Ok(CompletionResponse { content })
    }
}
