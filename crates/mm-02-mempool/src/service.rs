//! Upstream-driven refresh of the shared [`MempoolStore`].

use mm_01_backend::{BackendError, BitcoinBackend};
use parking_lot::RwLock;
use shared_types::{ExtendedTransaction, TimeSource, Txid};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::domain::{MempoolStore, RefreshOutcome};

/// Shared handle to the mempool snapshot. The sync loop is the only writer.
pub type SharedMempool = Arc<RwLock<MempoolStore>>;

pub struct MempoolSync {
    backend: Arc<dyn BitcoinBackend>,
    store: SharedMempool,
    time_source: Arc<dyn TimeSource>,
    fetch_budget: Duration,
}

impl MempoolSync {
    pub fn new(
        backend: Arc<dyn BitcoinBackend>,
        store: SharedMempool,
        time_source: Arc<dyn TimeSource>,
        fetch_budget: Duration,
    ) -> Self {
        Self {
            backend,
            store,
            time_source,
            fetch_budget,
        }
    }

    pub fn store(&self) -> &SharedMempool {
        &self.store
    }

    /// Pull the upstream mempool info into the store.
    pub async fn refresh_info(&self) -> Result<(), BackendError> {
        let info = self.backend.get_mempool_info().await?;
        self.store.write().set_mempool_info(info);
        Ok(())
    }

    /// One refresh cycle. Failing to list the upstream mempool aborts the
    /// cycle; individual fetch failures only skip that transaction.
    pub async fn refresh(&self) -> Result<RefreshOutcome, BackendError> {
        let upstream = self.backend.get_raw_mempool().await?;
        let missing: Vec<Txid> = {
            let store = self.store.read();
            upstream
                .iter()
                .filter(|txid| !store.contains(txid))
                .cloned()
                .collect()
        };

        let fetched = self.fetch_missing(&missing).await;
        let now = self.time_source.now();
        Ok(self.store.write().apply_refresh(&upstream, fetched, now))
    }

    async fn fetch_missing(&self, missing: &[Txid]) -> Vec<ExtendedTransaction> {
        let started = Instant::now();
        let mut fetched = Vec::with_capacity(missing.len());
        for txid in missing {
            match self.backend.get_raw_transaction(txid, false).await {
                Ok(tx) => fetched.push(tx),
                Err(e) => debug!(%txid, error = %e, "Error finding transaction in mempool"),
            }
            if started.elapsed() > self.fetch_budget {
                debug!(
                    fetched = fetched.len(),
                    remaining = missing.len() - fetched.len(),
                    "Mempool fetch budget exhausted, continuing next cycle"
                );
                break;
            }
        }
        fetched
    }
}
