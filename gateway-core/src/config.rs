use std::env;
use std::time::Duration;

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_csv(key: &str, default: &[&str]) -> Vec<String> {
    match env::var(key) {
        Ok(v) => v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}

/// Application-wide configuration, loaded once at startup from the process
/// environment. There is no config-file loading path: every field here has a
/// development-friendly default so the gateway runs out of the box.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub allowed_hosts: Vec<String>,

    pub secret_key: String,
    pub token_ttl: Duration,
    pub refresh_ttl: Duration,
    pub password_min_len: usize,
    pub max_login_attempts: u32,
    pub lockout_minutes: u32,

    pub cache_ttl_default: Duration,
    pub cache_max_entries: usize,
    pub compression_threshold: usize,

    pub max_connections: usize,
    pub heartbeat_secs: u64,
    pub idle_minutes: u64,
    pub batch_window_ms: u64,
    pub batch_max: usize,
    pub dedup_cache_size: usize,

    pub audit_retention_days: u32,
    pub audit_batch: usize,

    pub conversation_context_turns: usize,
    pub workflow_max_retries: u32,
    pub workflow_callback_timeout_secs: u64,

    pub rate_limit_per_minute: u32,
    pub rate_limit_per_hour: u32,
    pub rate_limit_burst: u32,

    pub llm_base_url: String,
    pub llm_api_key: String,
    pub analytics_client_id: String,
    pub analytics_client_secret: String,
    pub analytics_tenant_id: String,
    pub analytics_workspace_id: String,
    pub analytics_dataset_id: String,
    pub workflow_service_url: String,
    pub workflow_signing_key: String,

    /// Base URL this gateway is reachable at, used to build the callback
    /// URL handed to the external workflow service (§4.7).
    pub public_base_url: String,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self {
            port: env_parsed("PORT", 8000),
            cors_origins: env_csv("CORS_ORIGINS", &["http://localhost:3000", "http://127.0.0.1:3000"]),
            allowed_hosts: env_csv("ALLOWED_HOSTS", &["localhost", "127.0.0.1"]),

            secret_key: env_string("SECRET_KEY", "dev-secret-change-in-production"),
            token_ttl: Duration::from_secs(env_parsed::<u64>("TOKEN_TTL_HOURS", 24) * 3600),
            refresh_ttl: Duration::from_secs(env_parsed::<u64>("REFRESH_TTL_DAYS", 7) * 86_400),
            password_min_len: env_parsed("PASSWORD_MIN_LEN", 12),
            max_login_attempts: env_parsed("MAX_LOGIN_ATTEMPTS", 5),
            lockout_minutes: env_parsed("LOCKOUT_MINUTES", 30),

            cache_ttl_default: Duration::from_secs(env_parsed("CACHE_TTL_DEFAULT", 3600)),
            cache_max_entries: env_parsed("CACHE_MAX_ENTRIES", 10_000),
            compression_threshold: env_parsed("COMPRESSION_THRESHOLD", 1024),

            max_connections: env_parsed("MAX_CONNECTIONS", 1000),
            heartbeat_secs: env_parsed("HEARTBEAT_SECS", 30),
            idle_minutes: env_parsed("IDLE_MINUTES", 30),
            batch_window_ms: env_parsed("BATCH_WINDOW_MS", 100),
            batch_max: env_parsed("BATCH_MAX", 50),
            dedup_cache_size: env_parsed("DEDUP_CACHE_SIZE", 1000),

            audit_retention_days: env_parsed("AUDIT_RETENTION_DAYS", 2555),
            audit_batch: env_parsed("AUDIT_BATCH", 100),

            conversation_context_turns: env_parsed("CONVERSATION_CONTEXT_TURNS", 5),
            workflow_max_retries: env_parsed("WORKFLOW_MAX_RETRIES", 3),
            workflow_callback_timeout_secs: env_parsed("WORKFLOW_CALLBACK_TIMEOUT_SECS", 300),

            rate_limit_per_minute: env_parsed("RATE_LIMIT_PER_MINUTE", 100),
            rate_limit_per_hour: env_parsed("RATE_LIMIT_PER_HOUR", 1000),
            rate_limit_burst: env_parsed("RATE_LIMIT_BURST", 10),

            llm_base_url: env_string("LLM_SERVICE_BASE_URL", "https://llm.internal.example.com"),
            llm_api_key: env_string("LLM_SERVICE_API_KEY", ""),
            analytics_client_id: env_string("ANALYTICS_CLIENT_ID", ""),
            analytics_client_secret: env_string("ANALYTICS_CLIENT_SECRET", ""),
            analytics_tenant_id: env_string("ANALYTICS_TENANT_ID", ""),
            analytics_workspace_id: env_string("ANALYTICS_WORKSPACE_ID", ""),
            analytics_dataset_id: env_string("ANALYTICS_DATASET_ID", ""),
            workflow_service_url: env_string(
                "WORKFLOW_SERVICE_URL",
                "https://workflows.internal.example.com",
            ),
            workflow_signing_key: env_string("WORKFLOW_SIGNING_KEY", ""),
            public_base_url: env_string("PUBLIC_BASE_URL", "http://localhost:8000"),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
