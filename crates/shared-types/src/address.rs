//! Address balance summaries in the indexer's `chain_stats` / `mempool_stats` shape.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressStats {
    pub funded_txo_count: u64,
    pub funded_txo_sum: u64,
    pub spent_txo_count: u64,
    pub spent_txo_sum: u64,
    pub tx_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSummary {
    pub address: String,
    pub chain_stats: AddressStats,
    pub mempool_stats: AddressStats,
}

impl AddressSummary {
    /// Summary with all counters at zero, returned for unknown or invalid addresses.
    pub fn empty(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }
}
