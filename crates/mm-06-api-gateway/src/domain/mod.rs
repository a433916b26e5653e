//! Gateway domain: connection state, control frames, push frames and errors.

pub mod connection;
pub mod error;
pub mod frame;
pub mod matching;
pub mod subscription;
pub mod validation;

pub use connection::ConnectionId;
pub use error::{ApiError, GatewayError};
pub use frame::PushFrame;
pub use matching::{matches_tracked, touches_asset, NATIVE_ASSET_ID};
pub use subscription::{ClientSubscription, ControlOutcome};
