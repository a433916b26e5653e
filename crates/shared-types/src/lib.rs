//! # Shared Types Crate
//!
//! Canonical records exchanged between the mirror components.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every backend variant normalizes into the
//!   indexer-style shapes defined here (`ExtendedTransaction`, `Block`).
//! - **Derived fields are recomputed**: `vsize` and `feePerVsize` are never
//!   trusted from upstream, they are derived by [`ExtendedTransaction::extend`].
//! - **Wire compatibility**: field names follow the JSON keys pushed to
//!   clients and written to the disk cache.

pub mod address;
pub mod block;
pub mod fees;
pub mod mempool;
pub mod time;
pub mod transaction;

pub use address::{AddressStats, AddressSummary};
pub use block::{Block, ExtendedBlock};
pub use fees::{fees_in_range, median};
pub use mempool::MempoolInfo;
pub use time::{MockTimeSource, SystemTimeSource, TimeSource, Timestamp};
pub use transaction::{
    CoinbaseInput, CoinbaseOutput, CoinbaseStripped, ExtendedTransaction, Issuance,
    TransactionStripped, TxStatus, Txid, Vin, Vout,
};
