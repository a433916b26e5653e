//! Mempool domain: snapshot store, clear protection, throughput and RBF.

pub mod protection;
pub mod rbf;
pub mod store;
pub mod throughput;

pub use protection::{ClearProtection, ProtectionState};
pub use rbf::find_rbf_transactions;
pub use store::{MempoolStore, RefreshOutcome};
pub use throughput::{Throughput, ThroughputWindow};
