//! # API Gateway
//!
//! WebSocket push updates and REST delegations for the mempool mirror.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                         API GATEWAY (mm-06)                        │
//! ├───────────────────────────────────────────────────────────────────┤
//! │   {prefix}/ws          {prefix}/*  (REST)      /metrics  /health   │
//! │        │                     │                                     │
//! │  ┌─────┴──────┐        ┌─────┴──────┐                              │
//! │  │ ws handler │        │ rest.rs    │── BitcoinBackend             │
//! │  └─────┬──────┘        └─────┬──────┘                              │
//! │        │                     │                                     │
//! │  ┌─────┴─────────────────────┴──────┐                              │
//! │  │           BroadcastHub           │◄── ObserverBus (MirrorEvent) │
//! │  │ ClientSubscription per connection│                              │
//! │  │ shared projection, RBF, matching │                              │
//! │  └──────────────────────────────────┘                              │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Control frames (client → server)
//!
//! `{"action":"want","data":[...]}`, `{"action":"init"}`, `{"action":"ping"}`,
//! `{"track-tx": id, "watch-mempool"?: bool}`, `{"track-address": a}`,
//! `{"track-asset": id}`, `{"track-donation": id}`.
//!
//! # Push frames (server → client)
//!
//! One JSON object per event holding only the keys the connection is
//! entitled to: `block`, `blocks`, `mempool-blocks`, `mempoolInfo`,
//! `vBytesPerSecond`, `transactions`, `tx`, `rbfTransaction`,
//! `address-transactions`, `block-transactions`, `txConfirmed`, `pong`,
//! `loadingIndicators`, `donationConfirmed`, `git-commit`, `hostname`.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod domain;
pub mod hub;
pub mod rest;
pub mod service;
pub mod ws;

pub use config::GatewayConfig;
pub use domain::{ApiError, ClientSubscription, ConnectionId, GatewayError, PushFrame};
pub use hub::BroadcastHub;
pub use rest::AppState;
pub use service::GatewayService;
