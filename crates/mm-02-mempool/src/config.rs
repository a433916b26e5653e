//! Mempool sync configuration.

use std::time::Duration;

/// Upstream-restart heuristic parameters.
#[derive(Debug, Clone)]
pub struct ClearProtectionConfig {
    /// Local snapshot size above which a sudden drop is suspicious.
    pub min_size: usize,
    /// Upstream/local size ratio at or below which deletions are suspended.
    pub ratio: f64,
    /// How long deletions stay suspended.
    pub cooldown: Duration,
}

impl Default for ClearProtectionConfig {
    fn default() -> Self {
        Self {
            min_size: 20_000,
            ratio: 0.80,
            cooldown: Duration::from_secs(10 * 60),
        }
    }
}

/// Mempool store and sync configuration.
#[derive(Debug, Clone)]
pub struct MempoolConfig {
    /// Wall-clock budget for fetching new transactions in one cycle.
    pub fetch_budget: Duration,
    /// Window over which transactions/second and vbytes/second are averaged.
    pub throughput_sample_period: Duration,
    /// Size of the recent transactions ring.
    pub recent_transactions: usize,
    pub clear_protection: ClearProtectionConfig,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            fetch_budget: Duration::from_millis(10_000),
            throughput_sample_period: Duration::from_secs(150),
            recent_transactions: 6,
            clear_protection: ClearProtectionConfig::default(),
        }
    }
}
