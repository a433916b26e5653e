//! Projected block record.

use serde::{Deserialize, Serialize};
use shared_types::{fees_in_range, median, ExtendedTransaction, Txid};

/// One virtual upcoming block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedBlock {
    pub block_size: u64,
    #[serde(rename = "blockVSize")]
    pub block_vsize: f64,
    #[serde(rename = "nTx")]
    pub n_tx: usize,
    pub total_fees: u64,
    pub median_fee: f64,
    pub fee_range: Vec<f64>,
    /// Member ids in projection order. Kept server side for match rates
    /// and tracking, never pushed.
    #[serde(skip)]
    pub transaction_ids: Vec<Txid>,
}

impl ProjectedBlock {
    /// Summarise a bucket of transactions sorted by descending feerate.
    pub fn from_transactions(transactions: &[&ExtendedTransaction], block_index: usize) -> Self {
        let feerates: Vec<f64> = transactions.iter().map(|tx| tx.feerate()).collect();
        Self {
            block_size: transactions.iter().map(|tx| tx.size).sum(),
            block_vsize: transactions.iter().map(|tx| tx.vsize).sum(),
            n_tx: transactions.len(),
            total_fees: transactions.iter().map(|tx| tx.fee).sum(),
            median_fee: median(&feerates),
            fee_range: fees_in_range(&feerates, range_length(block_index, transactions.len())),
            transaction_ids: transactions.iter().map(|tx| tx.txid.clone()).collect(),
        }
    }
}

/// Fee range granularity: the first block always gets 8 samples, later
/// blocks scale with their transaction count.
pub fn range_length(block_index: usize, tx_count: usize) -> usize {
    if block_index == 0 || tx_count > 10_000 {
        8
    } else if tx_count > 4_000 {
        6
    } else {
        4
    }
}
