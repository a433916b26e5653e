//! Block header records and the statistics-enriched block kept by the chain store.

use serde::{Deserialize, Serialize};

use crate::transaction::{CoinbaseStripped, TransactionStripped};

/// Indexer-style block header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    pub height: u64,
    #[serde(default)]
    pub version: u32,
    pub timestamp: u64,
    #[serde(default)]
    pub tx_count: u64,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub weight: u64,
    #[serde(default)]
    pub merkle_root: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previousblockhash: Option<String>,
    #[serde(default)]
    pub nonce: u64,
    #[serde(default)]
    pub bits: u32,
    #[serde(default)]
    pub difficulty: f64,
}

/// Block plus the statistics derived at ingestion time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtendedBlock {
    #[serde(flatten)]
    pub block: Block,
    /// Sum of the coinbase output values, in satoshis.
    #[serde(default)]
    pub reward: u64,
    #[serde(rename = "coinbaseTx", default)]
    pub coinbase_tx: CoinbaseStripped,
    #[serde(rename = "medianFee", default)]
    pub median_fee: f64,
    #[serde(rename = "feeRange", default)]
    pub fee_range: Vec<f64>,
    /// Share of the block that the top projected block predicted, in percent.
    #[serde(rename = "matchRate", default, skip_serializing_if = "Option::is_none")]
    pub match_rate: Option<u32>,
    /// Stripped transactions sorted by descending feerate.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transactions: Vec<TransactionStripped>,
}

impl ExtendedBlock {
    pub fn hash(&self) -> &str {
        &self.block.id
    }

    pub fn height(&self) -> u64 {
        self.block.height
    }

    /// Copy without the per-transaction list, used for push frames.
    pub fn summary(&self) -> Self {
        Self {
            block: self.block.clone(),
            reward: self.reward,
            coinbase_tx: self.coinbase_tx.clone(),
            median_fee: self.median_fee,
            fee_range: self.fee_range.clone(),
            match_rate: self.match_rate,
            transactions: Vec::new(),
        }
    }
}
