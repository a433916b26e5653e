//! Persistence domain: file shapes and errors.

pub mod errors;
pub mod files;

pub use errors::PersistenceError;
pub use files::{PrimaryFile, SidecarFile};
