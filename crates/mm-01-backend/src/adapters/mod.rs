//! Adapters layer: the three upstream variants and their factory.

pub mod bitcoind;
pub mod electrum;
pub mod esplora;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
mod rpc_client;

pub use bitcoind::{BitcoindBackend, ValidatedAddress};
pub use electrum::{ElectrumBackend, ElectrumClient, HistoryEntry};
pub use esplora::EsploraBackend;
#[cfg(any(test, feature = "test-utils"))]
pub use memory::{fake_hash, mempool_transaction, InMemoryBackend};

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::BackendConfig;
use crate::domain::sweep_task;
use crate::ports::{BackendKind, BitcoinBackend};

/// Interval of the Electrum history cache sweep.
const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Build the configured backend.
///
/// Must be called inside a Tokio runtime: the Electrum variant spawns its
/// cache sweep.
pub fn create_backend(config: &BackendConfig) -> Arc<dyn BitcoinBackend> {
    info!(backend = %config.kind, "Creating backend adapter");
    match config.kind {
        BackendKind::Bitcoind => Arc::new(BitcoindBackend::new(&config.core_rpc)),
        BackendKind::Esplora => Arc::new(EsploraBackend::new(&config.esplora_url)),
        BackendKind::Electrum => {
            let backend = ElectrumBackend::new(&config.core_rpc, &config.electrum);
            tokio::spawn(sweep_task(backend.history_cache(), CACHE_SWEEP_INTERVAL));
            Arc::new(backend)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_factory_selects_variant() {
        for kind in [BackendKind::Bitcoind, BackendKind::Esplora, BackendKind::Electrum] {
            let config = BackendConfig {
                kind,
                ..Default::default()
            };
            assert_eq!(create_backend(&config).kind(), kind);
        }
    }
}
