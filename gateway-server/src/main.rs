//! Process entry point: loads configuration, builds the shared
//! [`AppState`], spawns the background maintenance tasks each component
//! relies on, and serves the axum router — mirroring `adk-studio`'s
//! `main.rs` shape (config → state → scheduler tasks → `axum::serve`).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use gateway_core::GatewayConfig;
use gateway_server::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gateway_telemetry::init_from_env();

    let config = GatewayConfig::from_env();
    let port = config.port;
    let heartbeat_interval = Duration::from_secs(config.heartbeat_secs.max(1));
    let batch_window = Duration::from_millis(config.batch_window_ms.max(1));

    let state = Arc::new(AppState::new(config));

    spawn_background_tasks(state.clone(), heartbeat_interval, batch_window);

    let app = gateway_server::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "gateway listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Periodic maintenance the host process owns rather than any single
/// component: batch flushing, heartbeats, idle sweeps, workflow scheduling,
/// and the housekeeping sweeps each in-memory store needs since nothing
/// here is backed by an external TTL store.
fn spawn_background_tasks(state: Arc<AppState>, heartbeat_interval: Duration, batch_window: Duration) {
    // Flush batched websocket frames whose window elapsed.
    {
        let state = state.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(batch_window);
            loop {
                ticker.tick().await;
                let now = state.now();
                let _ = state.fabric.flush_stale_batches(now).await;
            }
        });
    }

    // Heartbeat every connected client.
    {
        let state = state.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(heartbeat_interval);
            loop {
                ticker.tick().await;
                let now = state.now();
                let _ = state.fabric.broadcast_heartbeat(now).await;
            }
        });
    }

    // Disconnect idle connections every 5 minutes (§4.6).
    {
        let state = state.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(300));
            loop {
                ticker.tick().await;
                let now = state.now();
                state.fabric.run_idle_sweep(now).await;
            }
        });
    }

    // Drain the audit log's batch queue to its sink.
    {
        let state = state.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(5));
            loop {
                ticker.tick().await;
                if let Err(err) = state.audit.drain_batch() {
                    tracing::error!(error = %err, "audit batch drain failed");
                }
            }
        });
    }

    // Prune audit events past the retention window, daily.
    {
        let state = state.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(86_400));
            loop {
                ticker.tick().await;
                let pruned = state.audit.prune_expired();
                if pruned > 0 {
                    tracing::info!(pruned, "audit retention sweep");
                }
            }
        });
    }

    // Evaluate cron schedules and retry due workflow executions every minute.
    {
        let state = state.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(60));
            loop {
                ticker.tick().await;
                let now = state.now();
                state.workflows.evaluate_schedules(now).await;
                state.workflows.poll_retries(now).await;
            }
        });
    }

    // Sweep the revoked-token blacklist and rate-limit buckets.
    {
        let state = state.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(60));
            loop {
                ticker.tick().await;
                state.auth.sweep_expired_blacklist();
                state.rate_limiter.sweep_expired(state.now());
            }
        });
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
