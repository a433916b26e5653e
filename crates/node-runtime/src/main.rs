//! # Mempool Mirror
//!
//! Mirrors a Bitcoin node's mempool and recent chain tip, projects upcoming
//! blocks by fee rate and pushes diffs to WebSocket clients.
//!
//! ## Environment
//!
//! See [`node_runtime::NodeConfig::from_env`] for the `MM_*` variables and
//! `mm_telemetry::TelemetryConfig::from_env` for logging.

use anyhow::{Context, Result};
use mm_01_backend::create_backend;
use mm_telemetry::{init_telemetry, TelemetryConfig};
use node_runtime::{MirrorNode, NodeConfig};
use shared_types::SystemTimeSource;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry =
        init_telemetry(TelemetryConfig::from_env()).context("Failed to initialize telemetry")?;

    let config = NodeConfig::from_env();
    info!("===========================================");
    info!("  Mempool Mirror v{}", env!("CARGO_PKG_VERSION"));
    info!("  Backend: {}", config.backend.kind);
    info!("===========================================");

    let backend = create_backend(&config.backend);
    let node = MirrorNode::new(config, backend, Arc::new(SystemTimeSource));
    node.restore().await;

    let addr = node.config().gateway.http_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let mut gateway_shutdown = node.shutdown_signal();
    let gateway = tokio::spawn(node.gateway().serve(listener, async move {
        let _ = gateway_shutdown.changed().await;
    }));

    let sync = tokio::spawn(node.sync_loop().run(node.shutdown_signal()));

    wait_for_termination().await?;
    node.shutdown();

    if let Err(e) = sync.await {
        error!(error = %e, "Sync loop task failed");
    }
    match gateway.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Gateway server failed"),
        Err(e) => error!(error = %e, "Gateway task failed"),
    }

    info!("Shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_termination() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for SIGINT")?;
            info!("SIGINT received");
        }
        _ = terminate.recv() => info!("SIGTERM received"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_termination() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Ctrl+C received");
    Ok(())
}
