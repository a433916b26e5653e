//! # Mempool Mirror Telemetry
//!
//! Logging and metrics for the mirror runtime.
//!
//! ## Components
//!
//! - **Logs**: `tracing` with an env filter, human or JSON output
//! - **Metrics**: Prometheus gauges and counters served at `/metrics`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mm_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).expect("telemetry");
//!     // Logs and metrics are now being collected
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MM_SERVICE_NAME` | `mempool-mirror` | Service name attached to startup logs |
//! | `MM_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `MM_JSON_LOGS` | `false` (`true` in containers) | JSON formatted logs |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, MetricsHandle, BLOCKS_INGESTED, CHAIN_TIP_HEIGHT,
    MEMPOOL_SIZE, MEMPOOL_VBYTES_PER_SECOND, SNAPSHOT_WRITES, SYNC_FAILURES, WS_CONNECTIONS,
    WS_FRAMES_SENT,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Initialize logging and register all metrics.
///
/// The returned guard must be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first so that early log lines can already reference them
    let metrics_handle = register_metrics()?;

    init_logging(&config)?;

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard {
        _metrics: metrics_handle,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}
