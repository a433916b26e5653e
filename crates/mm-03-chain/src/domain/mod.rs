//! Chain domain: bounded history, block statistics and errors.

pub mod errors;
pub mod stats;
pub mod store;

pub use errors::ChainError;
pub use stats::{extend_block, BLOCK_FEE_RANGE_LENGTH};
pub use store::ChainStore;
