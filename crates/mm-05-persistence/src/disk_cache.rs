//! # Disk Cache
//!
//! Writes the chain history and the mempool as `cache.json` plus sidecar
//! shards, and merges them back at startup.
//!
//! | Trigger | Path |
//! |---------|------|
//! | block ingested while in sync | [`DiskCache::save_async`] on a blocking worker |
//! | SIGINT / SIGTERM | [`DiskCache::save_sync`] before exit |
//! | startup | [`DiskCache::load`] before the sync loop starts |

use mm_02_mempool::SharedMempool;
use mm_03_chain::{SharedChain, SnapshotTrigger};
use mm_telemetry::SNAPSHOT_WRITES;
use serde::Serialize;
use shared_types::{ExtendedBlock, ExtendedTransaction};
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::PersistenceConfig;
use crate::domain::{PersistenceError, PrimaryFile, SidecarFile};

/// Point-in-time copy of both stores.
#[derive(Debug, Default)]
pub struct CacheSnapshot {
    pub blocks: Vec<ExtendedBlock>,
    /// Mempool records in insertion order.
    pub mempool: Vec<ExtendedTransaction>,
}

pub struct DiskCache {
    config: PersistenceConfig,
    mempool: SharedMempool,
    chain: SharedChain,
    writing: Arc<AtomicBool>,
}

impl DiskCache {
    pub fn new(config: PersistenceConfig, mempool: SharedMempool, chain: SharedChain) -> Self {
        Self {
            config,
            mempool,
            chain,
            writing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Copy both stores under short read locks.
    pub fn snapshot(&self) -> CacheSnapshot {
        let blocks = self.chain.read().blocks();
        let mempool = self
            .mempool
            .read()
            .transactions()
            .into_iter()
            .cloned()
            .collect();
        CacheSnapshot { blocks, mempool }
    }

    /// Write the snapshot on a blocking worker. A save already in progress
    /// makes this a no-op.
    pub fn save_async(&self) {
        if self.writing.swap(true, Ordering::AcqRel) {
            debug!("Disk cache write already in progress, skipping");
            return;
        }
        let snapshot = self.snapshot();
        let config = self.config.clone();
        let writing = self.writing.clone();
        let write = move || {
            record_outcome(&write_snapshot(&config, &snapshot));
            writing.store(false, Ordering::Release);
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(write);
            }
            Err(_) => write(),
        }
    }

    /// Write the snapshot on the calling thread.
    pub fn save_sync(&self) -> Result<(), PersistenceError> {
        let result = write_snapshot(&self.config, &self.snapshot());
        record_outcome(&result);
        result
    }

    /// Restore both stores from disk.
    ///
    /// Returns `false` when there is no primary file. Missing sidecars are
    /// skipped; duplicate txids keep the first occurrence.
    pub fn load(&self) -> Result<bool, PersistenceError> {
        let primary_path = self.config.shard_path(0);
        if !primary_path.exists() {
            info!(path = %primary_path.display(), "No disk cache found");
            return Ok(false);
        }
        let primary: PrimaryFile = read_json(&primary_path)?;

        let mut seen = HashSet::new();
        let mut mempool = Vec::new();
        let mut merge = |shard: Vec<ExtendedTransaction>| {
            for tx in shard {
                if seen.insert(tx.txid.clone()) {
                    mempool.push(tx);
                }
            }
        };
        merge(primary.mempool);
        for shard in 1..self.config.shard_count {
            let path = self.config.shard_path(shard);
            if !path.exists() {
                debug!(path = %path.display(), "Disk cache sidecar missing");
                continue;
            }
            let sidecar: SidecarFile = read_json(&path)?;
            merge(sidecar.mempool);
        }

        let (block_count, tx_count) = (primary.blocks.len(), mempool.len());
        self.chain.write().replace_all(primary.blocks);
        self.mempool.write().replace_all(mempool);
        info!(blocks = block_count, transactions = tx_count, "Restored disk cache");
        Ok(true)
    }
}

impl SnapshotTrigger for DiskCache {
    fn trigger_snapshot(&self) {
        self.save_async();
    }
}

fn record_outcome(result: &Result<(), PersistenceError>) {
    match result {
        Ok(()) => SNAPSHOT_WRITES.with_label_values(&["success"]).inc(),
        Err(e) => {
            SNAPSHOT_WRITES.with_label_values(&["failure"]).inc();
            warn!(error = %e, "Error writing disk cache");
        }
    }
}

/// Split the mempool into `shard_count` files of `shard_size` records; the
/// last file takes the remainder. Every file is rewritten so stale shards of
/// a larger earlier mempool do not survive.
pub fn write_snapshot(
    config: &PersistenceConfig,
    snapshot: &CacheSnapshot,
) -> Result<(), PersistenceError> {
    std::fs::create_dir_all(&config.cache_dir).map_err(|source| PersistenceError::Io {
        path: config.cache_dir.clone(),
        source,
    })?;

    let shard_count = config.shard_count.max(1);
    let shard_size = config.shard_size.max(1);
    let shard = |index: usize| -> Vec<ExtendedTransaction> {
        let start = (index * shard_size).min(snapshot.mempool.len());
        let end = if index == shard_count - 1 {
            snapshot.mempool.len()
        } else {
            ((index + 1) * shard_size).min(snapshot.mempool.len())
        };
        snapshot.mempool[start..end].to_vec()
    };

    write_json(
        &config.shard_path(0),
        &PrimaryFile {
            blocks: snapshot.blocks.clone(),
            mempool: shard(0),
        },
    )?;
    for index in 1..shard_count {
        write_json(
            &config.shard_path(index),
            &SidecarFile {
                mempool: shard(index),
            },
        )?;
    }
    debug!(
        transactions = snapshot.mempool.len(),
        blocks = snapshot.blocks.len(),
        "Disk cache written"
    );
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let io_error = |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };
    let bytes = serde_json::to_vec(value).map_err(|source| PersistenceError::Serialization {
        path: path.to_path_buf(),
        source,
    })?;

    let temp_path = path.with_extension("json.tmp");
    let mut file = std::fs::File::create(&temp_path).map_err(io_error)?;
    file.write_all(&bytes).map_err(io_error)?;
    file.sync_all().map_err(io_error)?;
    std::fs::rename(&temp_path, path).map_err(io_error)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, PersistenceError> {
    let bytes = std::fs::read(path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Serialization {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mm_02_mempool::{MempoolConfig, MempoolStore};
    use mm_03_chain::ChainStore;
    use parking_lot::RwLock;
    use shared_types::{Block, TxStatus};
    use std::time::Duration;
    use tempfile::TempDir;

    fn tx(n: u64) -> ExtendedTransaction {
        ExtendedTransaction {
            txid: format!("{n:064x}"),
            fee: 1_000 + n * 7,
            weight: 561 + n,
            status: TxStatus::unconfirmed(),
            first_seen: Some(1_700_000_000 + n),
            ..Default::default()
        }
        .extend()
    }

    fn block(height: u64) -> ExtendedBlock {
        ExtendedBlock {
            block: Block {
                id: format!("{height:064x}"),
                height,
                timestamp: 1_700_000_000 + height * 600,
                ..Default::default()
            },
            reward: 312_500_000,
            median_fee: 3.5,
            fee_range: vec![1.0, 2.0, 9.5],
            ..Default::default()
        }
    }

    fn stores() -> (SharedMempool, SharedChain) {
        (
            Arc::new(RwLock::new(MempoolStore::new(MempoolConfig::default()))),
            Arc::new(RwLock::new(ChainStore::new(32))),
        )
    }

    fn config(dir: &TempDir, shard_count: usize, shard_size: usize) -> PersistenceConfig {
        PersistenceConfig {
            cache_dir: dir.path().join("cache"),
            shard_count,
            shard_size,
        }
    }

    fn populated_cache(config: PersistenceConfig, transactions: u64) -> DiskCache {
        let (mempool, chain) = stores();
        mempool.write().replace_all((0..transactions).rev().map(tx));
        chain.write().replace_all((100..103).map(block).collect());
        DiskCache::new(config, mempool, chain)
    }

    #[test]
    fn test_round_trip_restores_both_stores() {
        let dir = TempDir::new().unwrap();
        let source = populated_cache(config(&dir, 3, 10), 25);
        source.save_sync().unwrap();

        let (mempool, chain) = stores();
        let restored = DiskCache::new(config(&dir, 3, 10), mempool.clone(), chain.clone());
        assert!(restored.load().unwrap());

        let before = source.snapshot();
        let after = restored.snapshot();
        assert_eq!(after.mempool, before.mempool);
        assert_eq!(after.blocks, before.blocks);
        assert_eq!(mempool.read().txids(), source.mempool.read().txids());
        assert_eq!(chain.read().tip_height(), Some(102));
    }

    #[test]
    fn test_shard_layout() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 2, 10);
        populated_cache(config.clone(), 25).save_sync().unwrap();

        let primary: PrimaryFile = read_json(&config.shard_path(0)).unwrap();
        let last: SidecarFile = read_json(&config.shard_path(1)).unwrap();
        assert_eq!(primary.blocks.len(), 3);
        assert_eq!(primary.mempool.len(), 10);
        // The last sidecar takes the remainder.
        assert_eq!(last.mempool.len(), 15);
        assert!(!config.shard_path(2).exists());
    }

    #[test]
    fn test_smaller_mempool_overwrites_stale_shards() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 3, 10);
        populated_cache(config.clone(), 25).save_sync().unwrap();
        populated_cache(config.clone(), 4).save_sync().unwrap();

        let (mempool, chain) = stores();
        DiskCache::new(config, mempool.clone(), chain).load().unwrap();
        assert_eq!(mempool.read().len(), 4);
    }

    #[test]
    fn test_missing_files() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 3, 10);
        let (mempool, chain) = stores();
        let cache = DiskCache::new(config.clone(), mempool.clone(), chain);
        assert!(!cache.load().unwrap());

        populated_cache(config.clone(), 25).save_sync().unwrap();
        std::fs::remove_file(config.shard_path(1)).unwrap();
        assert!(cache.load().unwrap());
        assert_eq!(mempool.read().len(), 15);
    }

    #[test]
    fn test_corrupt_primary_is_an_error() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 3, 10);
        std::fs::create_dir_all(&config.cache_dir).unwrap();
        std::fs::write(config.shard_path(0), b"{not json").unwrap();

        let (mempool, chain) = stores();
        let err = DiskCache::new(config, mempool, chain).load().unwrap_err();
        assert!(matches!(err, PersistenceError::Serialization { .. }));
    }

    #[tokio::test]
    async fn test_trigger_writes_in_background() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 3, 10);
        let cache = populated_cache(config.clone(), 5);

        cache.trigger_snapshot();
        for _ in 0..100 {
            if !cache.writing.load(Ordering::Acquire) && config.shard_path(2).exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let primary: PrimaryFile = read_json(&config.shard_path(0)).unwrap();
        assert_eq!(primary.mempool.len(), 5);
    }
}
