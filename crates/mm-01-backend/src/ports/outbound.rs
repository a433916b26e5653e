//! Outbound (Driven) port towards the upstream Bitcoin data source.

use async_trait::async_trait;
use shared_types::{AddressSummary, Block, ExtendedTransaction, MempoolInfo, Txid};
use std::fmt;
use std::str::FromStr;

use crate::domain::BackendError;

/// Which upstream implementation is serving the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Bitcoin Core JSON-RPC.
    #[default]
    Bitcoind,
    /// Esplora-compatible REST indexer.
    Esplora,
    /// Electrum protocol for addresses, Bitcoin Core RPC for the rest.
    Electrum,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Bitcoind => "bitcoind",
            BackendKind::Esplora => "esplora",
            BackendKind::Electrum => "electrum",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bitcoind" | "core" => Ok(BackendKind::Bitcoind),
            "esplora" => Ok(BackendKind::Esplora),
            "electrum" => Ok(BackendKind::Electrum),
            other => Err(format!("unknown backend kind: {other}")),
        }
    }
}

/// Capability contract every upstream variant fulfils.
///
/// Transactions are always returned in canonical form with derived fields
/// computed.
#[async_trait]
pub trait BitcoinBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Ids of every transaction currently in the upstream mempool.
    async fn get_raw_mempool(&self) -> Result<Vec<Txid>, BackendError>;

    /// Fetch one transaction. With `add_prevout` every non-coinbase input
    /// carries its resolved previous output.
    async fn get_raw_transaction(
        &self,
        txid: &str,
        add_prevout: bool,
    ) -> Result<ExtendedTransaction, BackendError>;

    /// Resolve the previous outputs of an already known transaction.
    async fn add_prevouts(
        &self,
        mut tx: ExtendedTransaction,
    ) -> Result<ExtendedTransaction, BackendError> {
        for vin in tx.vin.iter_mut() {
            if vin.prevout.is_some() || vin.is_coinbase {
                continue;
            }
            let funding = self.get_raw_transaction(&vin.txid, false).await?;
            vin.prevout = funding.vout.get(vin.vout as usize).cloned();
        }
        Ok(tx)
    }

    async fn get_block_height_tip(&self) -> Result<u64, BackendError>;

    async fn get_block_hash(&self, height: u64) -> Result<String, BackendError>;

    async fn get_block(&self, hash: &str) -> Result<Block, BackendError>;

    /// Transaction ids of a block, coinbase first.
    async fn get_tx_ids_for_block(&self, hash: &str) -> Result<Vec<Txid>, BackendError>;

    async fn get_mempool_info(&self) -> Result<MempoolInfo, BackendError>;

    async fn get_address(&self, address: &str) -> Result<AddressSummary, BackendError>;

    /// A page of an address history, newest first, continuing after
    /// `last_seen_txid` when given.
    async fn get_address_transactions(
        &self,
        address: &str,
        last_seen_txid: Option<&str>,
    ) -> Result<Vec<ExtendedTransaction>, BackendError>;
}
