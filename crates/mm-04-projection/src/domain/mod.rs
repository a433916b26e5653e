//! Projection domain.

pub mod engine;
pub mod fees;
pub mod projected;

pub use engine::ProjectionEngine;
pub use fees::{recommended_fees, RecommendedFees, DEFAULT_FEE};
pub use projected::{range_length, ProjectedBlock};
