//! # Disk Persistence
//!
//! Crash-resilient snapshot of the mempool and chain stores, split across
//! ten JSON files so no single document grows with the mempool.
//!
//! ```text
//! cache.json   { "blocks": [...], "mempool": { txid: tx, ... } }   shard 0
//! cache1.json  { "mempool": { ... } }                             shard 1
//! ...
//! cache9.json  { "mempool": { ... } }                             shard 9 + remainder
//! ```
//!
//! Write failures are logged and counted, never propagated into the sync
//! loop.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod disk_cache;
pub mod domain;

pub use config::PersistenceConfig;
pub use disk_cache::{write_snapshot, CacheSnapshot, DiskCache};
pub use domain::PersistenceError;
