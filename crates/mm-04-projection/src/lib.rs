//! # Projection Engine
//!
//! Estimates the next blocks a miner would assemble from the current
//! mempool snapshot, for fee estimation display.
//!
//! ```text
//! pending txs ──sort by feerate desc──→ [1M vB][1M vB] ... [rest of mempool]
//!                (ties: insertion order)    buckets 0..n-2    last bucket, uncapped
//! ```
//!
//! | Bucket | Fee range samples |
//! |--------|-------------------|
//! | first | 8 |
//! | later, more than 10,000 txs | 8 |
//! | later, more than 4,000 txs | 6 |
//! | later, otherwise | 4 |

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod domain;

pub use config::{ProjectionConfig, BLOCK_VSIZE_LIMIT};
pub use domain::{recommended_fees, ProjectedBlock, ProjectionEngine, RecommendedFees};
