//! # Mirror Node
//!
//! Owns every component instance and the handles they share. Built once
//! at startup; collaborators receive explicit handles, never globals.
//!
//! ```text
//!                 ┌──────────────┐
//!                 │   SyncLoop   │ (only writer)
//!                 └──┬────────┬──┘
//!          MempoolSync    BlockIngestor ──► DiskCache (snapshot trigger)
//!                 │        │
//!     SharedMempool        SharedChain
//!                 │        │
//!                 └──┬─────┘
//!              ObserverBus ──► BroadcastHub ──► GatewayService
//! ```

use mm_01_backend::BitcoinBackend;
use mm_02_mempool::{MempoolStore, MempoolSync, SharedMempool};
use mm_03_chain::{BlockIngestor, ChainStore, SharedChain};
use mm_04_projection::ProjectionEngine;
use mm_05_persistence::DiskCache;
use mm_06_api_gateway::{BroadcastHub, GatewayService};
use parking_lot::RwLock;
use shared_bus::{EventPublisher, MempoolChange, MirrorEvent, ObserverBus};
use shared_types::TimeSource;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::NodeConfig;
use crate::sync_loop::SyncLoop;

pub struct MirrorNode {
    config: NodeConfig,
    backend: Arc<dyn BitcoinBackend>,
    time_source: Arc<dyn TimeSource>,
    mempool: SharedMempool,
    chain: SharedChain,
    bus: Arc<ObserverBus>,
    hub: Arc<BroadcastHub>,
    disk_cache: Arc<DiskCache>,
    shutdown_tx: watch::Sender<bool>,
}

impl MirrorNode {
    pub fn new(
        config: NodeConfig,
        backend: Arc<dyn BitcoinBackend>,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        info!(backend = %backend.kind(), "Creating mempool mirror node");

        let mempool: SharedMempool =
            Arc::new(RwLock::new(MempoolStore::new(config.mempool.clone())));
        let chain: SharedChain =
            Arc::new(RwLock::new(ChainStore::new(config.chain.history_cap())));

        let hub = Arc::new(BroadcastHub::new(
            config.gateway.clone(),
            backend.clone(),
            mempool.clone(),
            chain.clone(),
            ProjectionEngine::new(config.projection.clone()),
            time_source.clone(),
        ));
        let bus = Arc::new(ObserverBus::new());
        bus.register(hub.clone());

        let disk_cache = Arc::new(DiskCache::new(
            config.persistence.clone(),
            mempool.clone(),
            chain.clone(),
        ));
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            backend,
            time_source,
            mempool,
            chain,
            bus,
            hub,
            disk_cache,
            shutdown_tx,
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn mempool(&self) -> &SharedMempool {
        &self.mempool
    }

    pub fn chain(&self) -> &SharedChain {
        &self.chain
    }

    pub fn bus(&self) -> &Arc<ObserverBus> {
        &self.bus
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn disk_cache(&self) -> &Arc<DiskCache> {
        &self.disk_cache
    }

    /// Load the disk cache into the stores and let observers rebuild
    /// derived state. Returns whether anything was restored.
    pub async fn restore(&self) -> bool {
        match self.disk_cache.load() {
            Ok(true) => {
                self.hub.recompute_projection();
                self.bus
                    .publish(MirrorEvent::MempoolChanged(Arc::new(MempoolChange::default())))
                    .await;
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!(error = %e, "Failed to restore disk cache, starting empty");
                false
            }
        }
    }

    /// Build the sync loop over this node's stores.
    pub fn sync_loop(&self) -> SyncLoop {
        let mempool_sync = MempoolSync::new(
            self.backend.clone(),
            self.mempool.clone(),
            self.time_source.clone(),
            self.config.mempool.fetch_budget,
        );
        let ingestor = BlockIngestor::new(
            self.backend.clone(),
            self.chain.clone(),
            self.mempool.clone(),
            self.bus.clone(),
            self.config.chain.clone(),
        )
        .with_snapshot_trigger(self.disk_cache.clone());
        SyncLoop::new(
            mempool_sync,
            ingestor,
            self.bus.clone(),
            self.time_source.clone(),
            &self.config.sync,
        )
    }

    pub fn gateway(&self) -> GatewayService {
        GatewayService::new(
            self.hub.clone(),
            self.backend.clone(),
            self.mempool.clone(),
            self.chain.clone(),
        )
    }

    /// Receiver that flips to `true` once [`MirrorNode::shutdown`] runs.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Stop the loops and write the disk cache on the calling thread.
    pub fn shutdown(&self) {
        info!("Initiating shutdown...");
        self.shutdown_tx.send_replace(true);

        match self.disk_cache.save_sync() {
            Ok(()) => info!("Disk cache saved"),
            Err(e) => error!(error = %e, "Failed to save disk cache"),
        }
    }
}
