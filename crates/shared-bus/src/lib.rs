//! # Shared Bus - Change Notifications for Mirror Consumers
//!
//! The sync loop is the only writer of the mempool and chain stores. After
//! each step it publishes what changed, and the bus hands the event to every
//! registered observer in registration order, inline on the publishing task.
//!
//! ```text
//! ┌──────────────┐   publish()   ┌──────────────┐   on_event()   ┌────────────────┐
//! │  Sync Loop   │ ────────────→ │ Observer Bus │ ─────────────→ │ Broadcast Hub  │
//! └──────────────┘               └──────────────┘ ─────────────→ │ other observers│
//!                                                                 └────────────────┘
//! ```
//!
//! ## Rules
//!
//! - Events are only published when something changed (push only on change).
//! - An observer failure is logged and never stops delivery to the others.
//! - Observers run sequentially with the sync loop, so an observer may touch
//!   the stores without racing the next refresh.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{BlockArrival, EventTopic, LoadingIndicators, MempoolChange, MirrorEvent};
pub use publisher::{EventPublisher, ObserverBus};
pub use subscriber::{EventObserver, ObserverError};
