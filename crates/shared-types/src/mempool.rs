//! Node-reported mempool summary.

use serde::{Deserialize, Serialize};

/// Mirror of the node's `getmempoolinfo` result.
///
/// The indexer variant only knows `size` and `bytes`; the remaining fields
/// stay at their defaults there.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MempoolInfo {
    #[serde(default)]
    pub loaded: bool,
    /// Number of transactions.
    #[serde(default)]
    pub size: u64,
    /// Total virtual size in vbytes.
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub usage: u64,
    #[serde(default)]
    pub maxmempool: u64,
    /// Minimum feerate to enter the node's mempool, BTC/kvB.
    #[serde(default)]
    pub mempoolminfee: f64,
    #[serde(default)]
    pub minrelaytxfee: f64,
}
