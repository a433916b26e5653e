//! # Mempool Store
//!
//! Local mirror of the upstream node's mempool. Each sync cycle lists the
//! upstream ids, fetches the unknown ones within a wall-clock budget and
//! reconciles the snapshot.
//!
//! ## Guarantees
//!
//! | Rule | Enforcement |
//! |------|-------------|
//! | No transaction is fetched twice while mirrored | `service.rs` - diff against local keys |
//! | `firstSeen` is set once, for unconfirmed txs only | `domain/store.rs` - `apply_refresh()` |
//! | Sharp shrink of a large mempool delays deletions | `domain/protection.rs` |
//! | `in_sync` flips only when sizes match | `domain/store.rs` |
//! | Change events only when something changed | `RefreshOutcome::change` |
//!
//! ## Module Structure
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  service.rs - MempoolSync (backend → store, fetch budget)       │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↓ drives ↓
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  domain/store.rs      - MempoolStore snapshot                   │
//! │  domain/protection.rs - clear protection state machine          │
//! │  domain/throughput.rs - tx/s and vB/s window                    │
//! │  domain/rbf.rs        - replacement detection                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod domain;
pub mod service;

pub use config::{ClearProtectionConfig, MempoolConfig};
pub use domain::{
    find_rbf_transactions, ClearProtection, MempoolStore, ProtectionState, RefreshOutcome,
    Throughput, ThroughputWindow,
};
pub use service::{MempoolSync, SharedMempool};
