//! Client for the external analytics-dataset service (the DS-Axia/Power BI
//! counterpart): OAuth2 client-credentials token acquisition plus DAX query
//! execution and dataset refresh, grounded on
//! `PowerBIService.get_access_token`/`query_axia_data`/`refresh_axia_dataset`.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gateway_core::Clock;
use serde::Deserialize;
use serde_json::Value;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Mirrors `expires_in - 60` in the original token cache: renew a little
/// before the token provider would reject it.
const TOKEN_EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("analytics service authentication failed")]
    AuthFailed,
    #[error("analytics query failed: {0}")]
    QueryFailed(String),
    #[error("analytics service request timed out")]
    Timeout,
    #[error("analytics service unreachable: {0}")]
    Transport(String),
}

#[async_trait]
pub trait AnalyticsClient: Send + Sync {
    async fn query(&self, dax_query: &str) -> Result<Value, AnalyticsError>;
    async fn refresh_dataset(&self) -> Result<Value, AnalyticsError>;
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// OAuth2 client-credentials flow against the tenant's token endpoint,
/// followed by `executeQueries`/`refreshes` calls against the configured
/// workspace/dataset, the same two-step shape as `get_access_token` +
/// `query_axia_data` in the original service.
pub struct HttpAnalyticsClient<C: Clock> {
    http: reqwest::Client,
    clock: std::sync::Arc<C>,
    authority: String,
    client_id: String,
    client_secret: String,
    scope: String,
    api_base: String,
    workspace_id: String,
    dataset_id: String,
    cached_token: RwLock<Option<CachedToken>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

impl<C: Clock> HttpAnalyticsClient<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: std::sync::Arc<C>,
        tenant_id: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        workspace_id: impl Into<String>,
        dataset_id: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build().expect("reqwest client build"),
            clock,
            authority: format!("https://login.microsoftonline.com/{tenant_id}"),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: "https://analysis.windows.net/powerbi/api/.default".to_string(),
            api_base: "https://api.powerbi.com/v1.0/myorg".to_string(),
            workspace_id: workspace_id.into(),
            dataset_id: dataset_id.into(),
            cached_token: RwLock::new(None),
        }
    }

    async fn access_token(&self) -> Result<String, AnalyticsError> {
        let now = self.clock.now();
        if let Some(cached) = self.cached_token.read().expect("token cache lock poisoned").as_ref() {
            if now < cached.expires_at {
                return Ok(cached.token.clone());
            }
        }

        let token_url = format!("{}/oauth2/v2.0/token", self.authority);
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", self.scope.as_str()),
            ("grant_type", "client_credentials"),
        ];

        let response = self.http.post(&token_url).form(&form).send().await.map_err(|e| {
            if e.is_timeout() { AnalyticsError::Timeout } else { AnalyticsError::Transport(e.to_string()) }
        })?;

        if !response.status().is_success() {
            return Err(AnalyticsError::AuthFailed);
        }
        let parsed: TokenResponse = response.json().await.map_err(|e| AnalyticsError::Transport(e.to_string()))?;
        let expires_at = now + chrono::Duration::seconds((parsed.expires_in - TOKEN_EXPIRY_SKEW_SECS).max(0));
        *self.cached_token.write().expect("token cache lock poisoned") =
            Some(CachedToken { token: parsed.access_token.clone(), expires_at });
        Ok(parsed.access_token)
    }
}

#[async_trait]
impl<C: Clock> AnalyticsClient for HttpAnalyticsClient<C> {
    async fn query(&self, dax_query: &str) -> Result<Value, AnalyticsError> {
        let token = self.access_token().await?;
        let url =
            format!("{}/groups/{}/datasets/{}/executeQueries", self.api_base, self.workspace_id, self.dataset_id);
        let body = serde_json::json!({
            "queries": [{"query": dax_query}],
            "serializerSettings": {"includeNulls": true},
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { AnalyticsError::Timeout } else { AnalyticsError::Transport(e.to_string()) })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AnalyticsError::QueryFailed(format!("dataset query returned {status}")));
        }
        response.json().await.map_err(|e| AnalyticsError::QueryFailed(e.to_string()))
    }

    async fn refresh_dataset(&self) -> Result<Value, AnalyticsError> {
        let token = self.access_token().await?;
        let url = format!("{}/groups/{}/datasets/{}/refreshes", self.api_base, self.workspace_id, self.dataset_id);

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({"notifyOption": "NoNotification"}))
            .send()
            .await
            .map_err(|e| if e.is_timeout() { AnalyticsError::Timeout } else { AnalyticsError::Transport(e.to_string()) })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AnalyticsError::QueryFailed(format!("dataset refresh returned {status}")));
        }
        Ok(serde_json::json!({ "status": "triggered" }))
    }
}
