//! Recommended fees derived from the projected blocks.

use serde::{Deserialize, Serialize};
use shared_types::MempoolInfo;

use super::projected::ProjectedBlock;

/// Floor feerate in sat/vB.
pub const DEFAULT_FEE: u64 = 1;

/// Projected blocks at or below this vsize are considered nearly empty.
const NEARLY_EMPTY_VSIZE: f64 = 500_000.0;
const NEARLY_FULL_VSIZE: f64 = 950_000.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedFees {
    pub fastest_fee: u64,
    pub half_hour_fee: u64,
    pub hour_fee: u64,
    pub minimum_fee: u64,
}

/// Fee tiers for the next block, ~3 blocks and ~6 blocks.
pub fn recommended_fees(blocks: &[ProjectedBlock], info: &MempoolInfo) -> RecommendedFees {
    // mempoolminfee is BTC/kvB.
    let minimum_fee = (info.mempoolminfee * 100_000.0).ceil() as u64;

    let Some(first) = blocks.first() else {
        return RecommendedFees {
            fastest_fee: DEFAULT_FEE,
            half_hour_fee: DEFAULT_FEE,
            hour_fee: DEFAULT_FEE,
            minimum_fee,
        };
    };

    if blocks.len() == 1 && first.block_vsize <= NEARLY_EMPTY_VSIZE {
        return RecommendedFees {
            fastest_fee: minimum_fee,
            half_hour_fee: minimum_fee,
            hour_fee: minimum_fee,
            minimum_fee,
        };
    }

    let fastest_fee = optimize_median_fee(first, blocks.get(1), None);
    let half_hour_fee = blocks
        .get(1)
        .map_or(DEFAULT_FEE, |block| {
            optimize_median_fee(block, blocks.get(2), Some(fastest_fee))
        });
    let hour_fee = blocks
        .get(2)
        .map_or(DEFAULT_FEE, |block| {
            optimize_median_fee(block, blocks.get(3), Some(half_hour_fee))
        });

    RecommendedFees {
        fastest_fee,
        half_hour_fee,
        hour_fee,
        minimum_fee,
    }
}

fn optimize_median_fee(
    block: &ProjectedBlock,
    next: Option<&ProjectedBlock>,
    previous_fee: Option<u64>,
) -> u64 {
    let use_fee = match previous_fee {
        Some(previous) => (block.median_fee + previous as f64) / 2.0,
        None => block.median_fee,
    };
    if block.block_vsize <= NEARLY_EMPTY_VSIZE {
        return DEFAULT_FEE;
    }
    if block.block_vsize <= NEARLY_FULL_VSIZE && next.is_none() {
        let multiplier = (block.block_vsize - NEARLY_EMPTY_VSIZE) / NEARLY_EMPTY_VSIZE;
        return ((use_fee * multiplier).round() as u64).max(DEFAULT_FEE);
    }
    use_fee.ceil() as u64
}
