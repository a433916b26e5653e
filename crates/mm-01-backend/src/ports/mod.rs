//! Ports layer for the backend adapter.
//!
//! The upstream node is the only driven dependency of the mirror; every
//! component reaches it through [`BitcoinBackend`].

pub mod outbound;

pub use outbound::*;
