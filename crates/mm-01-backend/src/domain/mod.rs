//! # Domain Layer - Backend Adapter
//!
//! ## Components
//!
//! - `errors`: BackendError enumeration
//! - `script`: script type names, asm conversion, script hashes
//! - `normalizer`: node RPC shapes to canonical records
//! - `cache`: TTL cache swept by a background task

pub mod cache;
pub mod errors;
pub mod normalizer;
pub mod script;

pub use cache::{sweep_task, ExpiringCache};
pub use errors::BackendError;
pub use normalizer::{
    RpcBlock, RpcMempoolEntry, RpcScriptPubKey, RpcScriptSig, RpcTransaction, RpcVin, RpcVout,
    TransactionNormalizer,
};
pub use script::{btc_to_sats, convert_script_asm, electrum_script_hash, translate_script_type};
