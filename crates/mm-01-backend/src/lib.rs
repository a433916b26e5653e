//! # Backend Adapter
//!
//! One capability contract, [`BitcoinBackend`], over three interchangeable
//! upstream data sources. The variant is chosen once from configuration.
//!
//! | Variant | Transport | Address lookups |
//! |---------|-----------|-----------------|
//! | `bitcoind` | Bitcoin Core JSON-RPC over HTTP | unsupported (405) |
//! | `esplora` | Esplora REST | pass-through |
//! | `electrum` | Electrum JSON-RPC over TCP + Core RPC | script hash queries, 2s cache |
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  adapters/ - bitcoind, esplora, electrum, in-memory (tests)     │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ports/outbound.rs - BitcoinBackend trait, BackendKind          │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  domain/normalizer.rs - RPC shapes → ExtendedTransaction        │
//! │  domain/script.rs     - type names, asm, script hashes          │
//! │  domain/cache.rs      - TTL cache with background sweep         │
//! │  domain/errors.rs     - BackendError                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;

pub use adapters::create_backend;
#[cfg(any(test, feature = "test-utils"))]
pub use adapters::{fake_hash, mempool_transaction, InMemoryBackend};
pub use config::{BackendConfig, CoreRpcConfig, ElectrumConfig};
pub use domain::{BackendError, TransactionNormalizer};
pub use ports::{BackendKind, BitcoinBackend};
