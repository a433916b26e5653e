//! # Block Ingestor
//!
//! Walks the chain forward from the last stored height to the upstream tip,
//! one height at a time, and announces each stored block on the bus.

use mm_01_backend::BitcoinBackend;
use mm_02_mempool::SharedMempool;
use parking_lot::RwLock;
use shared_bus::{BlockArrival, EventPublisher, MirrorEvent};
use shared_types::ExtendedTransaction;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{ChainConfig, DIFFICULTY_EPOCH};
use crate::domain::{extend_block, ChainError, ChainStore};
use crate::ports::SnapshotTrigger;

/// Shared handle to the chain history. The sync loop is the only writer.
pub type SharedChain = Arc<RwLock<ChainStore>>;

pub struct BlockIngestor {
    backend: Arc<dyn BitcoinBackend>,
    chain: SharedChain,
    mempool: SharedMempool,
    publisher: Arc<dyn EventPublisher>,
    snapshot: Option<Arc<dyn SnapshotTrigger>>,
    config: ChainConfig,
}

impl BlockIngestor {
    pub fn new(
        backend: Arc<dyn BitcoinBackend>,
        chain: SharedChain,
        mempool: SharedMempool,
        publisher: Arc<dyn EventPublisher>,
        config: ChainConfig,
    ) -> Self {
        Self {
            backend,
            chain,
            mempool,
            publisher,
            snapshot: None,
            config,
        }
    }

    /// Request a snapshot after every block ingested while the mempool is in sync.
    #[must_use]
    pub fn with_snapshot_trigger(mut self, trigger: Arc<dyn SnapshotTrigger>) -> Self {
        self.snapshot = Some(trigger);
        self
    }

    pub fn chain(&self) -> &SharedChain {
        &self.chain
    }

    /// Ingest every block between the stored tip and the upstream tip.
    ///
    /// Returns the number of blocks stored. A failure stops the walk; blocks
    /// stored before it are kept.
    pub async fn update_blocks(&self) -> Result<usize, ChainError> {
        let window = self.config.initial_block_amount;
        let tip = self.backend.get_block_height_tip().await?;
        let stored_tip = self.chain.read().tip_height();

        let mut current = stored_tip.unwrap_or_else(|| tip.saturating_sub(window));
        if tip.saturating_sub(current) > self.config.fast_forward_gap() {
            info!(
                behind = tip - current,
                window, "Blocks since tip exceed the window, fast forwarding"
            );
            current = tip.saturating_sub(window);
        }

        if self.chain.read().last_difficulty_adjustment().is_none() {
            self.seed_difficulty_adjustment(tip).await?;
        }

        let mut ingested = 0;
        while current < tip {
            current = if current == 0 { tip } else { current + 1 };
            self.ingest_height(current).await?;
            ingested += 1;
        }
        Ok(ingested)
    }

    async fn seed_difficulty_adjustment(&self, tip: u64) -> Result<(), ChainError> {
        let anchor_height = tip - tip % DIFFICULTY_EPOCH;
        let hash = self.backend.get_block_hash(anchor_height).await?;
        let block = self.backend.get_block(&hash).await?;
        debug!(anchor_height, timestamp = block.timestamp, "Difficulty adjustment anchor");
        self.chain
            .write()
            .set_last_difficulty_adjustment(block.timestamp);
        Ok(())
    }

    async fn ingest_height(&self, height: u64) -> Result<(), ChainError> {
        let hash = self.backend.get_block_hash(height).await?;
        let block = self.backend.get_block(&hash).await?;
        let txids = self.backend.get_tx_ids_for_block(&hash).await?;
        if txids.is_empty() {
            return Err(ChainError::EmptyBlock { height });
        }

        let known: Vec<Option<ExtendedTransaction>> = {
            let mempool = self.mempool.read();
            txids.iter().map(|txid| mempool.get(txid).cloned()).collect()
        };

        let mut transactions = Vec::with_capacity(txids.len());
        let mut found_in_mempool = 0;
        for (index, (txid, known)) in txids.iter().zip(known).enumerate() {
            if let Some(tx) = known {
                transactions.push(tx);
                found_in_mempool += 1;
                continue;
            }
            match self.backend.get_raw_transaction(txid, false).await {
                Ok(tx) => transactions.push(tx),
                Err(e) if index == 0 => {
                    debug!(height, %txid, error = %e, "Coinbase fetch failed");
                    return Err(ChainError::CoinbaseUnavailable {
                        height,
                        txid: txid.clone(),
                    });
                }
                Err(e) => debug!(height, %txid, error = %e, "Skipping block transaction"),
            }
        }
        debug!(
            height,
            found_in_mempool,
            total = txids.len(),
            "Resolved block transactions"
        );

        let (extended, transactions) = extend_block(block, transactions);
        {
            let mut chain = self.chain.write();
            if height % DIFFICULTY_EPOCH == 0 {
                chain.set_last_difficulty_adjustment(extended.block.timestamp);
            }
            chain.push(extended.clone());
        }
        info!(
            height,
            hash = %extended.block.id,
            tx_count = txids.len(),
            "New block found"
        );

        self.publisher
            .publish(MirrorEvent::BlockArrived(Arc::new(BlockArrival {
                block: extended,
                txids,
                transactions,
            })))
            .await;

        let in_sync = self.mempool.read().is_in_sync();
        if in_sync {
            if let Some(trigger) = &self.snapshot {
                trigger.trigger_snapshot();
            }
        }
        Ok(())
    }
}
