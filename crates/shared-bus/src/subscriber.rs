//! # Event Observer
//!
//! The receiving side of the bus.

use crate::events::{EventTopic, MirrorEvent};
use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by an observer while handling an event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ObserverError {
    #[error("observer failed: {0}")]
    Failed(String),
}

/// Consumer of mirror events.
///
/// Observers are awaited inline by the publisher; they must not block on
/// anything slower than the work the event itself implies.
#[async_trait]
pub trait EventObserver: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Topics this observer wants. Defaults to everything.
    fn topics(&self) -> &'static [EventTopic] {
        &[
            EventTopic::Mempool,
            EventTopic::Blocks,
            EventTopic::Loading,
            EventTopic::Donations,
        ]
    }

    async fn on_event(&self, event: &MirrorEvent) -> Result<(), ObserverError>;
}
