//! Chain store configuration.

/// Blocks between difficulty adjustments.
pub const DIFFICULTY_EPOCH: u64 = 2016;

#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Retention window: the history is seeded this many blocks below the
    /// tip and capped at four times this many blocks.
    pub initial_block_amount: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            initial_block_amount: 8,
        }
    }
}

impl ChainConfig {
    /// Maximum number of retained blocks.
    pub fn history_cap(&self) -> usize {
        (self.initial_block_amount * 4) as usize
    }

    /// Gap above which ingestion skips ahead instead of replaying.
    pub fn fast_forward_gap(&self) -> u64 {
        self.initial_block_amount * 2
    }
}
