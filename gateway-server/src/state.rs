//! Dependency-injection container (§9 design note): every component is
//! constructed once at startup and handed to handlers as `State<Arc<AppState>>`,
//! rather than reached for through a global singleton.

use std::path::PathBuf;
use std::sync::Arc;

use gateway_audit::{AuditLog, NullSink};
use gateway_auth::AuthService;
use gateway_core::{Clock, GatewayConfig, SystemClock};
use gateway_fabric::ConnectionFabric;
use gateway_router::{HttpLlmClient, Router, RouterConfig};
use gateway_workflow::{HttpWorkflowClient, WorkflowOrchestrator};

use crate::analytics::{AnalyticsClient, HttpAnalyticsClient};
use crate::fabric_sender::WsFrameSender;
use crate::middleware::RateLimiter;
use crate::users::UserDirectory;

pub struct AppState {
    pub config: GatewayConfig,
    pub clock: Arc<SystemClock>,
    pub auth: AuthService<SystemClock>,
    pub audit: AuditLog<SystemClock>,
    pub users: UserDirectory,
    pub router: Router,
    pub fabric: ConnectionFabric<WsFrameSender>,
    pub fabric_sender: Arc<WsFrameSender>,
    pub workflows: WorkflowOrchestrator<SystemClock, HttpWorkflowClient>,
    pub analytics: Arc<dyn AnalyticsClient>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Self {
        let clock = Arc::new(SystemClock);

        let auth = AuthService::new(
            config.secret_key.as_bytes(),
            clock.clone(),
            chrono::Duration::minutes(config.idle_minutes as i64),
        );

        let audit = AuditLog::new(
            clock.clone(),
            NullSink,
            Some(PathBuf::from("audit-fallback.log")),
            config.audit_retention_days as i64,
        );

        let users = UserDirectory::new();

        let llm_base_url = config.llm_base_url.clone();
        let llm_client = HttpLlmClient::new(
            move |variant| format!("{llm_base_url}/v1/chat/completions?variant={}", variant.as_str()),
            config.llm_api_key.clone(),
        );
        let router = Router::new(
            Arc::new(llm_client),
            RouterConfig { conversation_context_turns: config.conversation_context_turns, ..RouterConfig::default() },
        );

        let fabric_sender = Arc::new(WsFrameSender::new());
        let fabric = ConnectionFabric::new(config.max_connections, fabric_sender.clone());

        let workflow_client = HttpWorkflowClient::new(config.workflow_service_url.clone());
        let workflows = WorkflowOrchestrator::new(
            clock.clone(),
            Arc::new(workflow_client),
            config.workflow_signing_key.as_bytes().to_vec(),
            config.public_base_url.clone(),
        );

        let analytics: Arc<dyn AnalyticsClient> = Arc::new(HttpAnalyticsClient::new(
            clock.clone(),
            &config.analytics_tenant_id,
            config.analytics_client_id.clone(),
            config.analytics_client_secret.clone(),
            config.analytics_workspace_id.clone(),
            config.analytics_dataset_id.clone(),
        ));

        let rate_limiter =
            RateLimiter::new(config.rate_limit_per_minute, config.rate_limit_per_hour, config.rate_limit_burst);

        Self { config, clock, auth, audit, users, router, fabric, fabric_sender, workflows, analytics, rate_limiter }
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }
}
