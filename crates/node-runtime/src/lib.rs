//! # Node Runtime Library
//!
//! Configuration, the sync loop and the node wiring, exposed for the
//! binary in `main.rs` and for integration tests.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry
//! 2. Load [`NodeConfig`] from the environment
//! 3. Build the backend adapter and the [`MirrorNode`]
//! 4. Restore the disk cache
//! 5. Serve the gateway and run the [`SyncLoop`] until SIGINT/SIGTERM
//! 6. Stop both and write the disk cache synchronously

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod backoff;
pub mod config;
pub mod node;
pub mod sync_loop;

pub use backoff::{Retry, RetryBackoff};
pub use config::{NodeConfig, SyncConfig};
pub use node::MirrorNode;
pub use sync_loop::{CycleReport, SyncError, SyncLoop};
