//! # Broadcast Hub
//!
//! Owns every open WebSocket connection and turns mirror events into
//! per-connection push frames.
//!
//! ```text
//!  ObserverBus ──MirrorEvent──→ BroadcastHub ──PushFrame──→ connection queue ──→ socket writer
//!                                   │
//!                                   ├── projection (recomputed once per mempool change)
//!                                   └── DashMap<ConnectionId, Connection>
//! ```
//!
//! Fan-out works on a snapshot of the connection table: subscriptions are
//! cloned under a short lock, frames are built without any lock held, and
//! tracked-id updates are written back afterwards.

mod fanout;
mod observer;

use dashmap::DashMap;
use mm_01_backend::{BackendKind, BitcoinBackend};
use mm_02_mempool::SharedMempool;
use mm_03_chain::SharedChain;
use mm_04_projection::{ProjectedBlock, ProjectionEngine};
use mm_telemetry::{WS_CONNECTIONS, WS_FRAMES_SENT};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::{Map, Value};
use shared_bus::LoadingIndicators;
use shared_types::{ExtendedTransaction, TimeSource, Txid};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::config::GatewayConfig;
use crate::domain::{ClientSubscription, ConnectionId, GatewayError, PushFrame};

struct Connection {
    subscription: Mutex<ClientSubscription>,
    outbound: mpsc::Sender<String>,
}

/// Transactions already resolved with prevouts during one event.
type ResolveCache = HashMap<Txid, ExtendedTransaction>;

pub struct BroadcastHub {
    config: GatewayConfig,
    backend: Arc<dyn BitcoinBackend>,
    mempool: SharedMempool,
    chain: SharedChain,
    engine: ProjectionEngine,
    time_source: Arc<dyn TimeSource>,
    connections: DashMap<ConnectionId, Connection>,
    projection: RwLock<Arc<Vec<ProjectedBlock>>>,
    loading: RwLock<LoadingIndicators>,
    extra_init: RwLock<Map<String, Value>>,
}

impl BroadcastHub {
    pub fn new(
        config: GatewayConfig,
        backend: Arc<dyn BitcoinBackend>,
        mempool: SharedMempool,
        chain: SharedChain,
        engine: ProjectionEngine,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            config,
            backend,
            mempool,
            chain,
            engine,
            time_source,
            connections: DashMap::new(),
            projection: RwLock::new(Arc::new(Vec::new())),
            loading: RwLock::new(LoadingIndicators::new()),
            extra_init: RwLock::new(Map::new()),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Register a connection and return the receiving end of its queue.
    pub fn connect(&self) -> (ConnectionId, mpsc::Receiver<String>) {
        let id = ConnectionId::new();
        let (outbound, receiver) = mpsc::channel(self.config.outbound_queue.max(1));
        self.connections.insert(
            id,
            Connection {
                subscription: Mutex::new(ClientSubscription::default()),
                outbound,
            },
        );
        WS_CONNECTIONS.inc();
        debug!(connection_id = %id, "Connection registered");
        (id, receiver)
    }

    pub fn disconnect(&self, id: &ConnectionId) {
        if self.connections.remove(id).is_some() {
            WS_CONNECTIONS.dec();
            debug!(connection_id = %id, "Connection removed");
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn subscription(&self, id: &ConnectionId) -> Option<ClientSubscription> {
        self.connections
            .get(id)
            .map(|connection| connection.subscription.lock().clone())
    }

    /// Latest projection, shared with REST handlers.
    pub fn projection(&self) -> Arc<Vec<ProjectedBlock>> {
        self.projection.read().clone()
    }

    pub fn loading_indicators(&self) -> LoadingIndicators {
        self.loading.read().clone()
    }

    /// Add a key to every `init` reply, e.g. fiat conversions.
    pub fn set_init_property<T: Serialize>(&self, key: &str, value: &T) -> Result<(), GatewayError> {
        let value = serde_json::to_value(value)?;
        self.extra_init.write().insert(key.to_string(), value);
        Ok(())
    }

    /// Rebuild the projection from the current mempool snapshot.
    pub fn recompute_projection(&self) -> Arc<Vec<ProjectedBlock>> {
        let blocks = {
            let store = self.mempool.read();
            self.engine.project(&store)
        };
        let blocks = Arc::new(blocks);
        *self.projection.write() = blocks.clone();
        blocks
    }

    /// Apply one inbound control frame and send the reply, if any.
    pub async fn handle_client_message(
        &self,
        id: &ConnectionId,
        text: &str,
    ) -> Result<(), GatewayError> {
        let parsed: Value =
            serde_json::from_str(text).map_err(|e| GatewayError::InvalidFrame(e.to_string()))?;
        if !parsed.is_object() {
            return Err(GatewayError::InvalidFrame("expected a JSON object".into()));
        }

        let outcome = {
            let connection = self
                .connections
                .get(id)
                .ok_or(GatewayError::UnknownConnection(*id))?;
            let mut subscription = connection.subscription.lock();
            subscription.apply(&parsed)
        };

        let mut reply = PushFrame::new();
        if let Some(txid) = outcome.watch_mempool {
            let pending = self.mempool.read().get(&txid).cloned();
            match pending {
                Some(tx) => {
                    let mut cache = ResolveCache::new();
                    let tx = self.resolve(&tx, &mut cache).await?;
                    reply.insert("tx", &tx)?;
                }
                None => self.update_subscription(id, |subscription| {
                    subscription.track_mempool_tx = Some(txid);
                }),
            }
        }
        if outcome.init {
            reply.merge(self.init_data()?);
        }
        if outcome.pong {
            reply.insert("pong", &true)?;
        }

        if !reply.is_empty() {
            self.send(id, &reply)?;
        }
        Ok(())
    }

    /// Full state sent in reply to `init`.
    pub fn init_data(&self) -> Result<PushFrame, GatewayError> {
        let (mempool_info, vbytes_per_second, transactions) = {
            let store = self.mempool.read();
            (
                store.mempool_info().clone(),
                store
                    .throughput(self.time_source.now())
                    .vbytes_per_second,
                store.recent_transactions(),
            )
        };
        let (blocks, last_difficulty_adjustment) = {
            let chain = self.chain.read();
            let blocks: Vec<_> = chain
                .latest(self.config.initial_blocks)
                .iter()
                .map(|block| block.summary())
                .collect();
            (blocks, chain.last_difficulty_adjustment().unwrap_or_default())
        };

        let mut frame = PushFrame::new();
        frame.insert("mempoolInfo", &mempool_info)?;
        frame.insert("vBytesPerSecond", &vbytes_per_second)?;
        frame.insert("lastDifficultyAdjustment", &last_difficulty_adjustment)?;
        frame.insert("blocks", &blocks)?;
        frame.insert("mempool-blocks", self.projection().as_slice())?;
        frame.insert("transactions", &transactions)?;
        frame.insert("git-commit", &self.config.git_commit)?;
        frame.insert("hostname", &self.config.hostname)?;
        frame.insert("loadingIndicators", &self.loading_indicators())?;
        for (key, value) in self.extra_init.read().iter() {
            frame.insert(key, value)?;
        }
        Ok(frame)
    }

    fn subscriptions(&self) -> Vec<(ConnectionId, ClientSubscription)> {
        self.connections
            .iter()
            .map(|entry| (*entry.key(), entry.value().subscription.lock().clone()))
            .collect()
    }

    fn update_subscription(&self, id: &ConnectionId, update: impl FnOnce(&mut ClientSubscription)) {
        if let Some(connection) = self.connections.get(id) {
            update(&mut connection.subscription.lock());
        }
    }

    /// Queue a frame. A full queue drops the frame; a closed one is ignored
    /// until the socket task deregisters the connection.
    fn send(&self, id: &ConnectionId, frame: &PushFrame) -> Result<(), GatewayError> {
        let outbound = self
            .connections
            .get(id)
            .map(|connection| connection.outbound.clone())
            .ok_or(GatewayError::UnknownConnection(*id))?;

        match outbound.try_send(frame.to_text()?) {
            Ok(()) => WS_FRAMES_SENT.inc(),
            Err(TrySendError::Full(_)) => {
                warn!(connection_id = %id, "Outbound queue full, dropping frame");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(connection_id = %id, "Outbound queue closed");
            }
        }
        Ok(())
    }

    /// Queue a broadcast frame. A connection that went away mid-broadcast
    /// is skipped; the return value says whether the frame was queued.
    fn deliver(&self, id: &ConnectionId, frame: &PushFrame) -> bool {
        match self.send(id, frame) {
            Ok(()) => true,
            Err(e) => {
                debug!(connection_id = %id, error = %e, "Skipping connection in broadcast");
                false
            }
        }
    }

    /// Attach prevouts unless the backend already returns them.
    async fn resolve(
        &self,
        tx: &ExtendedTransaction,
        cache: &mut ResolveCache,
    ) -> Result<ExtendedTransaction, GatewayError> {
        if self.backend.kind() == BackendKind::Esplora {
            return Ok(tx.clone());
        }
        if let Some(resolved) = cache.get(&tx.txid) {
            return Ok(resolved.clone());
        }
        let resolved = self.backend.add_prevouts(tx.clone()).await?;
        cache.insert(tx.txid.clone(), resolved.clone());
        Ok(resolved)
    }

    /// [`Self::resolve`] for broadcasts: on a failed lookup the transaction
    /// is used as is, so only its outputs can match, and the failure is
    /// cached for the rest of the event.
    async fn resolve_or_unresolved(
        &self,
        tx: &ExtendedTransaction,
        cache: &mut ResolveCache,
    ) -> ExtendedTransaction {
        match self.resolve(tx, cache).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(txid = %tx.txid, error = %e, "Prevout lookup failed, matching outputs only");
                cache.insert(tx.txid.clone(), tx.clone());
                tx.clone()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use mm_01_backend::{fake_hash, mempool_transaction, InMemoryBackend};
    use mm_02_mempool::{MempoolConfig, MempoolStore};
    use mm_03_chain::ChainStore;
    use mm_04_projection::ProjectionConfig;
    use serde_json::json;
    use shared_types::MockTimeSource;
    use tokio_test::{assert_err, assert_ok};

    pub(crate) struct Fixture {
        pub hub: Arc<BroadcastHub>,
        pub backend: Arc<InMemoryBackend>,
        pub mempool: SharedMempool,
        pub chain: SharedChain,
    }

    pub(crate) fn fixture_with(backend: InMemoryBackend, config: GatewayConfig) -> Fixture {
        let backend = Arc::new(backend);
        let mempool: SharedMempool =
            Arc::new(RwLock::new(MempoolStore::new(MempoolConfig::default())));
        let chain: SharedChain = Arc::new(RwLock::new(ChainStore::new(32)));
        let hub = Arc::new(BroadcastHub::new(
            config,
            backend.clone(),
            mempool.clone(),
            chain.clone(),
            ProjectionEngine::new(ProjectionConfig::default()),
            Arc::new(MockTimeSource::new(1_700_000_000_000)),
        ));
        Fixture {
            hub,
            backend,
            mempool,
            chain,
        }
    }

    pub(crate) fn fixture() -> Fixture {
        fixture_with(InMemoryBackend::new(), GatewayConfig::default())
    }

    pub(crate) fn drain(receiver: &mut mpsc::Receiver<String>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(text) = receiver.try_recv() {
            frames.push(serde_json::from_str(&text).unwrap());
        }
        frames
    }

    #[tokio::test]
    async fn test_ping_gets_pong() {
        let f = fixture();
        let (id, mut rx) = f.hub.connect();

        assert_ok!(f.hub.handle_client_message(&id, r#"{"action":"ping"}"#).await);

        assert_eq!(drain(&mut rx), vec![json!({"pong": true})]);
    }

    #[tokio::test]
    async fn test_init_reply_contents() {
        let f = fixture_with(
            InMemoryBackend::new(),
            GatewayConfig {
                git_commit: "abc123".into(),
                hostname: "mirror-1".into(),
                ..Default::default()
            },
        );
        f.hub.set_init_property("conversions", &json!({"USD": 65000})).unwrap();
        let (id, mut rx) = f.hub.connect();

        f.hub
            .handle_client_message(&id, r#"{"action":"init"}"#)
            .await
            .unwrap();

        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 1);
        let init = &frames[0];
        for key in [
            "mempoolInfo",
            "vBytesPerSecond",
            "lastDifficultyAdjustment",
            "blocks",
            "mempool-blocks",
            "transactions",
            "loadingIndicators",
        ] {
            assert!(init.get(key).is_some(), "missing {key}");
        }
        assert_eq!(init["git-commit"], "abc123");
        assert_eq!(init["hostname"], "mirror-1");
        assert_eq!(init["conversions"]["USD"], 65000);
    }

    #[tokio::test]
    async fn test_want_updates_subscription_without_reply() {
        let f = fixture();
        let (id, mut rx) = f.hub.connect();

        f.hub
            .handle_client_message(&id, r#"{"action":"want","data":["blocks","stats"]}"#)
            .await
            .unwrap();

        let subscription = f.hub.subscription(&id).unwrap();
        assert!(subscription.want_blocks);
        assert!(subscription.want_stats);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_watch_mempool_hit_replies_with_tx() {
        let f = fixture();
        let txid = fake_hash(0xaa, 1);
        f.mempool
            .write()
            .replace_all([mempool_transaction(&txid, 1_000, 800)]);
        let (id, mut rx) = f.hub.connect();

        let message = json!({"track-tx": txid, "watch-mempool": true}).to_string();
        f.hub.handle_client_message(&id, &message).await.unwrap();

        let frames = drain(&mut rx);
        assert_eq!(frames[0]["tx"]["txid"], txid.as_str());
        assert_eq!(f.hub.subscription(&id).unwrap().track_mempool_tx, None);
    }

    #[tokio::test]
    async fn test_watch_mempool_miss_remembers_id() {
        let f = fixture();
        let txid = fake_hash(0xaa, 2);
        let (id, mut rx) = f.hub.connect();

        let message = json!({"track-tx": txid, "watch-mempool": true}).to_string();
        f.hub.handle_client_message(&id, &message).await.unwrap();

        assert!(drain(&mut rx).is_empty());
        assert_eq!(f.hub.subscription(&id).unwrap().track_mempool_tx, Some(txid));
    }

    #[tokio::test]
    async fn test_invalid_frames_are_rejected() {
        let f = fixture();
        let (id, _rx) = f.hub.connect();

        assert!(matches!(
            f.hub.handle_client_message(&id, "not json").await,
            Err(GatewayError::InvalidFrame(_))
        ));
        assert!(matches!(
            f.hub.handle_client_message(&id, "[1,2]").await,
            Err(GatewayError::InvalidFrame(_))
        ));
        let stranger = ConnectionId::new();
        assert_err!(f.hub.handle_client_message(&stranger, "{}").await);
    }

    #[tokio::test]
    async fn test_full_queue_drops_frames() {
        let f = fixture_with(
            InMemoryBackend::new(),
            GatewayConfig {
                outbound_queue: 1,
                ..Default::default()
            },
        );
        let (id, mut rx) = f.hub.connect();

        for _ in 0..3 {
            f.hub
                .handle_client_message(&id, r#"{"action":"ping"}"#)
                .await
                .unwrap();
        }

        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn test_disconnect() {
        let f = fixture();
        let (id, _rx) = f.hub.connect();
        assert_eq!(f.hub.connection_count(), 1);
        f.hub.disconnect(&id);
        f.hub.disconnect(&id);
        assert_eq!(f.hub.connection_count(), 0);
        assert!(f.hub.subscription(&id).is_none());
    }
}
