//! # Mirror Events
//!
//! Everything the sync loop announces to its observers.

use shared_types::{ExtendedBlock, ExtendedTransaction, Txid};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Progress (0-100) of long running loads, keyed by name (e.g. `mempool`).
pub type LoadingIndicators = BTreeMap<String, u8>;

/// Result of one mempool refresh that changed the snapshot.
#[derive(Debug, Clone, Default)]
pub struct MempoolChange {
    /// Transactions fetched and added during this cycle.
    pub new_transactions: Vec<ExtendedTransaction>,
    /// Transactions that vanished upstream and were removed.
    pub deleted_transactions: Vec<ExtendedTransaction>,
}

impl MempoolChange {
    pub fn is_empty(&self) -> bool {
        self.new_transactions.is_empty() && self.deleted_transactions.is_empty()
    }
}

/// A freshly ingested block together with its full transaction list.
#[derive(Debug, Clone)]
pub struct BlockArrival {
    pub block: ExtendedBlock,
    /// Block transaction ids in block order.
    pub txids: Vec<Txid>,
    /// Resolved transactions, sorted by descending feerate.
    pub transactions: Vec<ExtendedTransaction>,
}

/// Event categories, used by observers to filter what they receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTopic {
    Mempool,
    Blocks,
    Loading,
    Donations,
}

/// All events published on the bus.
#[derive(Debug, Clone)]
pub enum MirrorEvent {
    /// The mempool snapshot changed (new and/or deleted transactions).
    /// An empty change is published once after a disk restore so observers
    /// can rebuild derived state.
    MempoolChanged(Arc<MempoolChange>),

    /// A block was appended to the chain store.
    BlockArrived(Arc<BlockArrival>),

    /// Loading progress changed.
    LoadingChanged(LoadingIndicators),

    /// An outside collaborator confirmed a donation id.
    DonationConfirmed(String),
}

impl MirrorEvent {
    pub fn topic(&self) -> EventTopic {
        match self {
            MirrorEvent::MempoolChanged(_) => EventTopic::Mempool,
            MirrorEvent::BlockArrived(_) => EventTopic::Blocks,
            MirrorEvent::LoadingChanged(_) => EventTopic::Loading,
            MirrorEvent::DonationConfirmed(_) => EventTopic::Donations,
        }
    }
}
