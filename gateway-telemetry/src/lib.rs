//! Structured logging bootstrap for the conversational analytics gateway.
//!
//! Mirrors the workspace's own `init_telemetry`-style entry point: a config
//! struct loaded from the environment, a single `Once`-guarded init, and a
//! `tracing-subscriber` registry with an `EnvFilter` + `fmt` layer. No OTLP
//! exporter is wired up here; that machinery is a non-goal for this gateway.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Configuration for the telemetry system, loaded once at startup.
#[derive(Debug, Clone)]
pub struct GatewayTelemetryConfig {
    pub service_name: String,
    pub default_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl GatewayTelemetryConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into(), default_level: "info".to_string(), log_format: LogFormat::Pretty }
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.default_level = level.into();
        self
    }

    /// Load configuration from `SERVICE_NAME`, `LOG_LEVEL`, `LOG_FORMAT` (`pretty` | `json`).
    pub fn from_env() -> Self {
        let service_name = std::env::var("SERVICE_NAME").unwrap_or_else(|_| "bi-gateway".to_string());
        let default_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = match std::env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        Self { service_name, default_level, log_format }
    }
}

/// Initialize telemetry with basic console logging. Safe to call from
/// multiple entry points (binaries, tests) — only the first call takes effect.
pub fn init_telemetry(service_name: &str) {
    init_with_config(GatewayTelemetryConfig::new(service_name))
}

/// Initialize telemetry from `GatewayTelemetryConfig::from_env()`.
pub fn init_from_env() {
    init_with_config(GatewayTelemetryConfig::from_env())
}

pub fn init_with_config(config: GatewayTelemetryConfig) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.default_level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let registry = tracing_subscriber::registry().with(filter);

        match config.log_format {
            LogFormat::Json => {
                let fmt_layer = fmt::layer().json().with_target(true).with_thread_ids(true).with_line_number(true);
                registry.with(fmt_layer).init();
            }
            LogFormat::Pretty => {
                let fmt_layer = fmt::layer().with_target(true).with_thread_ids(true).with_line_number(true);
                registry.with(fmt_layer).init();
            }
        }

        tracing::info!(
            service.name = %config.service_name,
            log.level = %config.default_level,
            log.format = ?config.log_format,
            "telemetry initialized"
        );
    });
}
