//! # Outbound Ports
//!
//! Dependencies the ingestor calls out to once a block has been stored.

/// Requests a background disk snapshot. Implementations must return
/// immediately; failures are theirs to log.
pub trait SnapshotTrigger: Send + Sync {
    fn trigger_snapshot(&self);
}
