//! # Sync Loop
//!
//! The single writer of the mempool and chain stores. Each cycle refreshes
//! the mempool info, ingests new blocks, then refreshes the mempool
//! snapshot and publishes what changed. Failed cycles are retried with a
//! doubling interval.

use mm_01_backend::BackendError;
use mm_02_mempool::MempoolSync;
use mm_03_chain::{BlockIngestor, ChainError};
use mm_telemetry::{
    BLOCKS_INGESTED, CHAIN_TIP_HEIGHT, MEMPOOL_SIZE, MEMPOOL_VBYTES_PER_SECOND, SYNC_FAILURES,
};
use shared_bus::{EventPublisher, LoadingIndicators, MirrorEvent};
use shared_types::TimeSource;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backoff::RetryBackoff;
use crate::config::SyncConfig;

/// Loading indicator key for the initial mempool download.
pub const MEMPOOL_LOADING: &str = "mempool";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// What one successful cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub blocks_ingested: usize,
    pub new_transactions: usize,
    pub deleted_transactions: usize,
}

pub struct SyncLoop {
    mempool: MempoolSync,
    ingestor: BlockIngestor,
    publisher: Arc<dyn EventPublisher>,
    time_source: Arc<dyn TimeSource>,
    poll_interval: Duration,
    backoff: RetryBackoff,
}

impl SyncLoop {
    pub fn new(
        mempool: MempoolSync,
        ingestor: BlockIngestor,
        publisher: Arc<dyn EventPublisher>,
        time_source: Arc<dyn TimeSource>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            mempool,
            ingestor,
            publisher,
            time_source,
            poll_interval: config.poll_interval,
            backoff: RetryBackoff::new(config.retry_floor, config.retry_cap),
        }
    }

    /// Run one cycle and return the delay before the next one.
    pub async fn tick(&mut self) -> Duration {
        match self.run_cycle().await {
            Ok(report) => {
                debug!(
                    blocks = report.blocks_ingested,
                    added = report.new_transactions,
                    deleted = report.deleted_transactions,
                    "Sync cycle complete"
                );
                self.backoff.on_success();
                self.poll_interval
            }
            Err(e) => {
                SYNC_FAILURES.inc();
                let retry = self.backoff.on_failure();
                if retry.escalate {
                    warn!(
                        error = %e,
                        retry_in_secs = retry.delay.as_secs(),
                        "Sync cycle failed"
                    );
                    self.mempool.store().write().set_out_of_sync();
                } else {
                    debug!(
                        error = %e,
                        retry_in_secs = retry.delay.as_secs(),
                        "Sync cycle failed"
                    );
                }
                retry.delay
            }
        }
    }

    /// Refresh info, ingest blocks, refresh the mempool, publish changes.
    pub async fn run_cycle(&self) -> Result<CycleReport, SyncError> {
        self.mempool.refresh_info().await?;
        let blocks_ingested = self.ingestor.update_blocks().await?;
        let outcome = self.mempool.refresh().await?;

        let mut report = CycleReport {
            blocks_ingested,
            ..Default::default()
        };
        if let Some(change) = outcome.change {
            report.new_transactions = change.new_transactions.len();
            report.deleted_transactions = change.deleted_transactions.len();
            self.publisher
                .publish(MirrorEvent::MempoolChanged(Arc::new(change)))
                .await;
        }
        if let Some(progress) = outcome.loading_progress {
            let mut indicators = LoadingIndicators::new();
            indicators.insert(MEMPOOL_LOADING.to_string(), progress);
            self.publisher
                .publish(MirrorEvent::LoadingChanged(indicators))
                .await;
        }

        self.update_metrics(blocks_ingested);
        Ok(report)
    }

    /// Cycle until `shutdown` flips to true or its sender goes away.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Sync loop started"
        );
        while !*shutdown.borrow() {
            let delay = self.tick().await;
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("Sync loop stopped");
    }

    fn update_metrics(&self, blocks_ingested: usize) {
        let now = self.time_source.now();
        {
            let store = self.mempool.store().read();
            MEMPOOL_SIZE.set(store.len() as f64);
            MEMPOOL_VBYTES_PER_SECOND.set(store.throughput(now).vbytes_per_second);
        }
        if let Some(tip) = self.ingestor.chain().read().tip_height() {
            CHAIN_TIP_HEIGHT.set(tip as f64);
        }
        BLOCKS_INGESTED.inc_by(blocks_ingested as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mm_01_backend::{fake_hash, mempool_transaction, InMemoryBackend};
    use mm_02_mempool::{MempoolConfig, MempoolStore};
    use mm_03_chain::{ChainConfig, ChainStore};
    use parking_lot::RwLock;
    use shared_bus::{EventObserver, ObserverBus, ObserverError};
    use shared_types::MockTimeSource;

    #[derive(Default)]
    struct Recorder {
        events: parking_lot::Mutex<Vec<MirrorEvent>>,
    }

    #[async_trait::async_trait]
    impl EventObserver for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn on_event(&self, event: &MirrorEvent) -> Result<(), ObserverError> {
            self.events.lock().push(event.clone());
            Ok(())
        }
    }

    fn sync_loop(backend: Arc<InMemoryBackend>, recorder: Arc<Recorder>) -> SyncLoop {
        let clock: Arc<MockTimeSource> = Arc::new(MockTimeSource::new(1_000_000));
        let mempool_config = MempoolConfig::default();
        let chain_config = ChainConfig::default();
        let mempool = Arc::new(RwLock::new(MempoolStore::new(mempool_config.clone())));
        let chain = Arc::new(RwLock::new(ChainStore::new(chain_config.history_cap())));
        let bus = Arc::new(ObserverBus::new());
        bus.register(recorder);

        let mempool_sync = MempoolSync::new(
            backend.clone(),
            mempool.clone(),
            clock.clone(),
            mempool_config.fetch_budget,
        );
        let ingestor = BlockIngestor::new(backend, chain, mempool, bus.clone(), chain_config);
        SyncLoop::new(mempool_sync, ingestor, bus, clock, &SyncConfig::default())
    }

    #[tokio::test]
    async fn test_cycle_publishes_changes() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.extend_chain_to(20);
        backend.add_mempool_transactions(
            (0..3).map(|n| mempool_transaction(&fake_hash(0xaa, n), 1_000, 800)),
        );
        let recorder = Arc::new(Recorder::default());
        let sync = sync_loop(backend, recorder.clone());

        let report = sync.run_cycle().await.unwrap();
        assert_eq!(report.blocks_ingested, 8);
        assert_eq!(report.new_transactions, 3);
        assert!(sync.mempool.store().read().is_in_sync());

        let events = recorder.events.lock();
        let blocks = events
            .iter()
            .filter(|e| matches!(e, MirrorEvent::BlockArrived(_)))
            .count();
        assert_eq!(blocks, 8);
        assert!(matches!(events.last(), Some(MirrorEvent::LoadingChanged(_))));
    }

    #[tokio::test]
    async fn test_unchanged_mempool_publishes_nothing() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.extend_chain_to(10);
        backend.add_mempool_transaction(mempool_transaction(&fake_hash(0xaa, 1), 1_000, 800));
        let recorder = Arc::new(Recorder::default());
        let sync = sync_loop(backend, recorder.clone());

        sync.run_cycle().await.unwrap();
        let published = recorder.events.lock().len();

        let report = sync.run_cycle().await.unwrap();
        assert_eq!(report, CycleReport::default());
        assert_eq!(recorder.events.lock().len(), published);
    }

    #[tokio::test]
    async fn test_failures_back_off_and_mark_out_of_sync() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.extend_chain_to(10);
        let recorder = Arc::new(Recorder::default());
        let mut sync = sync_loop(backend.clone(), recorder);

        assert_eq!(sync.tick().await, Duration::from_secs(2));
        assert!(sync.mempool.store().read().is_in_sync());

        backend.fail_next_calls(2);
        assert_eq!(sync.tick().await, Duration::from_secs(5));
        // A single miss is tolerated.
        assert!(sync.mempool.store().read().is_in_sync());

        assert_eq!(sync.tick().await, Duration::from_secs(10));
        assert!(!sync.mempool.store().read().is_in_sync());

        // Recovery resets the interval and resyncs.
        assert_eq!(sync.tick().await, Duration::from_secs(2));
        assert!(sync.mempool.store().read().is_in_sync());
        assert_eq!(sync.backoff.current(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.extend_chain_to(10);
        let sync = sync_loop(backend, Arc::new(Recorder::default()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(sync.run(shutdown_rx));
        tokio::time::sleep(Duration::from_secs(7)).await;
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
