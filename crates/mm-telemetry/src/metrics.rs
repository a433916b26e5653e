//! Prometheus metrics for the mirror.
//!
//! All metrics follow the naming convention: `mm_<component>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., blocks_ingested_total)
//! - **Gauge**: Value that can go up or down (e.g., mempool_transactions)

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // MEMPOOL METRICS
    // =========================================================================

    /// Current mempool size (transaction count)
    pub static ref MEMPOOL_SIZE: Gauge = Gauge::new(
        "mm_mempool_transactions",
        "Number of transactions in the mirrored mempool"
    ).expect("metric creation failed");

    /// Incoming virtual bytes per second over the sample window
    pub static ref MEMPOOL_VBYTES_PER_SECOND: Gauge = Gauge::new(
        "mm_mempool_vbytes_per_second",
        "Virtual bytes per second entering the mempool"
    ).expect("metric creation failed");

    // =========================================================================
    // CHAIN METRICS
    // =========================================================================

    /// Height of the newest ingested block
    pub static ref CHAIN_TIP_HEIGHT: Gauge = Gauge::new(
        "mm_chain_tip_height",
        "Height of the newest ingested block"
    ).expect("metric creation failed");

    /// Total blocks ingested
    pub static ref BLOCKS_INGESTED: Counter = Counter::new(
        "mm_chain_blocks_ingested_total",
        "Total number of blocks ingested"
    ).expect("metric creation failed");

    // =========================================================================
    // SYNC METRICS
    // =========================================================================

    /// Failed sync cycles
    pub static ref SYNC_FAILURES: Counter = Counter::new(
        "mm_sync_failures_total",
        "Total number of failed sync cycles"
    ).expect("metric creation failed");

    // =========================================================================
    // GATEWAY METRICS
    // =========================================================================

    /// Open WebSocket connections
    pub static ref WS_CONNECTIONS: Gauge = Gauge::new(
        "mm_ws_connections",
        "Number of currently open WebSocket connections"
    ).expect("metric creation failed");

    /// Push frames queued to WebSocket clients
    pub static ref WS_FRAMES_SENT: Counter = Counter::new(
        "mm_ws_frames_sent_total",
        "Total push frames queued to WebSocket clients"
    ).expect("metric creation failed");

    // =========================================================================
    // PERSISTENCE METRICS
    // =========================================================================

    /// Disk snapshot writes by outcome
    pub static ref SNAPSHOT_WRITES: CounterVec = CounterVec::new(
        Opts::new("mm_persistence_snapshot_writes_total", "Disk snapshot writes"),
        &["outcome"]  // outcome: success/failure
    ).expect("metric creation failed");
}

/// Handle to the registered metrics
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Mempool
        Box::new(MEMPOOL_SIZE.clone()),
        Box::new(MEMPOOL_VBYTES_PER_SECOND.clone()),
        // Chain
        Box::new(CHAIN_TIP_HEIGHT.clone()),
        Box::new(BLOCKS_INGESTED.clone()),
        // Sync
        Box::new(SYNC_FAILURES.clone()),
        // Gateway
        Box::new(WS_CONNECTIONS.clone()),
        Box::new(WS_FRAMES_SENT.clone()),
        // Persistence
        Box::new(SNAPSHOT_WRITES.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
