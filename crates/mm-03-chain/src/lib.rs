//! # Chain Store
//!
//! Bounded history of the most recent confirmed blocks, each enriched with
//! reward, stripped coinbase and fee statistics at ingestion time.
//!
//! ## Ingestion Rules
//!
//! | Situation | Behaviour |
//! |-----------|-----------|
//! | Empty history | seed at `tip - window` (at the tip if that is height 0) |
//! | Gap above `2 × window` | fast-forward to `tip - window`, no backfill |
//! | Block tx already pending | reuse the mempool record |
//! | Coinbase fetch fails | abort ingestion of that height |
//! | Other tx fetch fails | skip the transaction |
//! | Height divisible by 2016 | record the difficulty adjustment time |
//! | History above `4 × window` | drop the oldest blocks |
//!
//! After each stored block the ingestor publishes `BlockArrived` on the bus
//! and, when the mempool is in sync, requests a background snapshot.
//!
//! ## Module Structure
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  service.rs - BlockIngestor (backend → chain store → bus)       │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↓ uses ↓
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ports/outbound.rs - SnapshotTrigger                            │
//! │  domain/store.rs   - ChainStore                                 │
//! │  domain/stats.rs   - reward, medianFee, feeRange                │
//! │  domain/errors.rs  - ChainError                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use config::{ChainConfig, DIFFICULTY_EPOCH};
pub use domain::{extend_block, ChainError, ChainStore};
pub use ports::SnapshotTrigger;
pub use service::{BlockIngestor, SharedChain};
