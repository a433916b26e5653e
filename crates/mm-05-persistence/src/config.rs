//! Disk cache configuration.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub cache_dir: PathBuf,
    /// Total number of files: `cache.json` plus `shard_count - 1` sidecars.
    pub shard_count: usize,
    /// Mempool records per file. The last sidecar takes any remainder.
    pub shard_size: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./cache"),
            shard_count: 10,
            shard_size: 10_000,
        }
    }
}

impl PersistenceConfig {
    /// `cache.json` for shard 0, `cache{n}.json` after that.
    pub fn shard_path(&self, shard: usize) -> PathBuf {
        if shard == 0 {
            self.cache_dir.join("cache.json")
        } else {
            self.cache_dir.join(format!("cache{shard}.json"))
        }
    }
}
