//! # Domain Errors

use mm_01_backend::BackendError;
use shared_types::Txid;
use thiserror::Error;

/// Block ingestion failures. Blocks ingested before the failure are kept.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The first transaction of the block could not be resolved.
    #[error("failed to fetch coinbase transaction {txid} of block {height}")]
    CoinbaseUnavailable { height: u64, txid: Txid },

    #[error("block {height} has no transactions")]
    EmptyBlock { height: u64 },
}
