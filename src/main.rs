//! Upstream Health - Entry Point
//!
//! Hosts a tracker with Prometheus export and a JSON snapshot API.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use upstream_health::{Config, Tracker, VERSION};

/// Application entry point
#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    // Load configuration
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Initialize tracing/logging
    upstream_health::util::init_tracing(&config.logging)?;

    info!(
        version = VERSION,
        config_path = ?config_path,
        project = %config.tracker.project_id,
        "Starting upstream health tracker"
    );

    // Initialize metrics if enabled
    if config.metrics.enabled {
        upstream_health::metrics::init_metrics(&config.metrics)?;
        info!(
            bind_addr = %config.metrics.bind_addr,
            "Metrics endpoint started"
        );
    }

    let tracker = Tracker::from_config(&config.tracker)
        .context("Failed to create tracker")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reset_loop = tracker.bootstrap(shutdown_rx);

    if config.api.enabled {
        upstream_health::metrics::start_api_server(config.api.bind_addr, tracker.clone());
    }

    shutdown_signal().await;
    info!("Shutdown signal received, stopping tracker");

    let _ = shutdown_tx.send(true);
    if let Err(e) = reset_loop.await {
        warn!(error = %e, "Reset loop ended abnormally");
    }

    info!("Tracker stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
