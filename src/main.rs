// HTML render service
//
// Serves `POST /` (HTML or URL to PNG/JPEG/WebP/PDF) and `GET /health` over
// HTTP, backed by one supervised headless Chromium. Listens on port 3033 by default.

use anyhow::{Context, Result};
use std::future::IntoFuture;
use kodegen_tools_htmlrender::{
    BrowserSupervisor, ChromeLauncher, RenderConfig, RenderExecutor, browser_profile, http,
    telemetry,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = RenderConfig::from_env()?;
    telemetry::init(config.log_format())?;

    info!(
        bind = %config.bind_addr(),
        pool_size = config.pool_size(),
        timeout_ms = config.render_timeout().as_millis() as u64,
        "Starting HTML render service"
    );

    // Nothing of ours is running yet, so every leftover profile is stale
    if let Err(e) = browser_profile::cleanup_stale_profiles() {
        warn!("Failed to clean stale Chrome profiles: {e:#}");
    }

    let launcher = ChromeLauncher::new(config.launch_settings());
    let supervisor = BrowserSupervisor::start(launcher, config.pool_size())
        .await
        .context("Failed to start browser")?;

    let executor = RenderExecutor::new(supervisor.clone(), config.executor_settings());
    let router = http::build_router(executor, config.max_body_bytes());

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;
    info!("HTML render service listening on {}", config.bind_addr());

    let failed = {
        let supervisor = supervisor.clone();
        async move { supervisor.failed().await }
    };

    let server = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();

    let served = tokio::select! {
        result = server => {
            result.context("HTTP server error")
        }
        () = failed => {
            error!("Browser could not be relaunched, exiting");
            Err(anyhow::anyhow!("browser supervisor failed"))
        }
    };

    if let Err(e) = supervisor.shutdown().await {
        warn!("Browser shutdown reported an error: {e:#}");
    }
    served
}

/// Resolves on Ctrl-C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("Shutdown signal received, draining requests");
}
