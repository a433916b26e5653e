//! Projection configuration.

/// Virtual block size used for bin packing, in vbytes.
pub const BLOCK_VSIZE_LIMIT: f64 = 1_000_000.0;

#[derive(Debug, Clone)]
pub struct ProjectionConfig {
    /// Number of projected blocks. The last one takes every remaining
    /// transaction regardless of size.
    pub mempool_blocks_amount: usize,
    pub block_vsize_limit: f64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            mempool_blocks_amount: 8,
            block_vsize_limit: BLOCK_VSIZE_LIMIT,
        }
    }
}
