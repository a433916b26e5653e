//! # Chain Store
//!
//! Ordered history of recent blocks, ascending by height with the newest
//! last. Only the block ingestor appends; the broadcast hub records match
//! rates on the stored copies.

use shared_types::ExtendedBlock;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct ChainStore {
    blocks: VecDeque<ExtendedBlock>,
    cap: usize,
    /// Timestamp (secs) of the last difficulty adjustment block.
    last_difficulty_adjustment: Option<u64>,
}

impl ChainStore {
    pub fn new(cap: usize) -> Self {
        Self {
            blocks: VecDeque::with_capacity(cap),
            cap,
            last_difficulty_adjustment: None,
        }
    }

    /// Append a block, discarding the oldest beyond the cap.
    pub fn push(&mut self, block: ExtendedBlock) {
        self.blocks.push_back(block);
        while self.blocks.len() > self.cap {
            self.blocks.pop_front();
        }
    }

    /// Replace the history, e.g. from a disk restore.
    pub fn replace_all(&mut self, blocks: Vec<ExtendedBlock>) {
        self.blocks = blocks.into();
        while self.blocks.len() > self.cap {
            self.blocks.pop_front();
        }
    }

    pub fn blocks(&self) -> Vec<ExtendedBlock> {
        self.blocks.iter().cloned().collect()
    }

    /// The newest `count` blocks, oldest first.
    pub fn latest(&self, count: usize) -> Vec<ExtendedBlock> {
        let skip = self.blocks.len().saturating_sub(count);
        self.blocks.iter().skip(skip).cloned().collect()
    }

    pub fn tip(&self) -> Option<&ExtendedBlock> {
        self.blocks.back()
    }

    pub fn tip_height(&self) -> Option<u64> {
        self.tip().map(ExtendedBlock::height)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get_by_hash(&self, hash: &str) -> Option<&ExtendedBlock> {
        self.blocks.iter().find(|block| block.hash() == hash)
    }

    pub fn get_by_height(&self, height: u64) -> Option<&ExtendedBlock> {
        self.blocks.iter().find(|block| block.height() == height)
    }

    pub fn set_match_rate(&mut self, hash: &str, match_rate: u32) {
        if let Some(block) = self.blocks.iter_mut().find(|block| block.hash() == hash) {
            block.match_rate = Some(match_rate);
        }
    }

    pub fn last_difficulty_adjustment(&self) -> Option<u64> {
        self.last_difficulty_adjustment
    }

    pub fn set_last_difficulty_adjustment(&mut self, timestamp: u64) {
        self.last_difficulty_adjustment = Some(timestamp);
    }
}
