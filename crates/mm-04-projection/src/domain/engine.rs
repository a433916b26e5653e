//! # Projection Engine
//!
//! Greedy bin packing of pending transactions by descending feerate. The
//! result is rebuilt from scratch on every mempool change and carries no
//! state between runs.

use mm_02_mempool::MempoolStore;
use shared_types::ExtendedTransaction;
use tracing::debug;

use super::projected::ProjectedBlock;
use crate::config::ProjectionConfig;

#[derive(Debug, Clone, Default)]
pub struct ProjectionEngine {
    config: ProjectionConfig,
}

impl ProjectionEngine {
    pub fn new(config: ProjectionConfig) -> Self {
        Self { config }
    }

    /// Project the current mempool snapshot.
    pub fn project(&self, mempool: &MempoolStore) -> Vec<ProjectedBlock> {
        self.project_transactions(mempool.transactions())
    }

    /// Project transactions given in insertion order, which is kept as the
    /// tie-break between equal feerates.
    pub fn project_transactions(
        &self,
        mut transactions: Vec<&ExtendedTransaction>,
    ) -> Vec<ProjectedBlock> {
        transactions.retain(|tx| tx.fee > 0);
        transactions.sort_by(|a, b| b.feerate().total_cmp(&a.feerate()));

        let amount = self.config.mempool_blocks_amount.max(1);
        let mut blocks = Vec::new();
        let mut current: Vec<&ExtendedTransaction> = Vec::new();
        let mut current_vsize = 0.0;
        for tx in transactions {
            let fits = current_vsize + tx.vsize <= self.config.block_vsize_limit;
            if fits || blocks.len() == amount - 1 {
                current_vsize += tx.vsize;
                current.push(tx);
            } else {
                blocks.push(ProjectedBlock::from_transactions(&current, blocks.len()));
                current_vsize = tx.vsize;
                current = vec![tx];
            }
        }
        if !current.is_empty() {
            blocks.push(ProjectedBlock::from_transactions(&current, blocks.len()));
        }

        debug!(blocks = blocks.len(), "Mempool blocks projected");
        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mm_02_mempool::MempoolConfig;

    fn tx(n: u64, fee: u64, weight: u64) -> ExtendedTransaction {
        ExtendedTransaction {
            txid: format!("{n:064x}"),
            fee,
            weight,
            size: weight / 4,
            ..Default::default()
        }
        .extend()
    }

    fn engine(amount: usize) -> ProjectionEngine {
        ProjectionEngine::new(ProjectionConfig {
            mempool_blocks_amount: amount,
            ..Default::default()
        })
    }

    #[test]
    fn test_buckets_are_capped_by_vsize() {
        // 25 transactions of 100k vbytes each.
        let txs: Vec<ExtendedTransaction> = (0..25).map(|n| tx(n, 100_000 + n, 400_000)).collect();
        let blocks = engine(8).project_transactions(txs.iter().collect());

        let counts: Vec<usize> = blocks.iter().map(|block| block.n_tx).collect();
        assert_eq!(counts, vec![10, 10, 5]);
        assert_eq!(blocks[0].block_vsize, 1_000_000.0);
        assert_eq!(blocks[0].fee_range.len(), 8);
        assert_eq!(blocks[1].fee_range.len(), 4);
        // Highest feerates first.
        assert_eq!(blocks[0].transaction_ids[0], txs[24].txid);
    }

    #[test]
    fn test_last_bucket_is_uncapped() {
        let txs: Vec<ExtendedTransaction> = (0..25).map(|n| tx(n, 100_000 + n, 400_000)).collect();
        let blocks = engine(2).project_transactions(txs.iter().collect());

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].n_tx, 15);
        assert_eq!(blocks[1].block_vsize, 1_500_000.0);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let txs: Vec<ExtendedTransaction> = vec![tx(3, 1_000, 800), tx(1, 1_000, 800), tx(2, 5_000, 800)];
        let blocks = engine(8).project_transactions(txs.iter().collect());

        assert_eq!(
            blocks[0].transaction_ids,
            vec![txs[2].txid.clone(), txs[0].txid.clone(), txs[1].txid.clone()]
        );
    }

    #[test]
    fn test_zero_fee_transactions_are_excluded() {
        let txs = vec![tx(1, 0, 800), tx(2, 1_000, 800)];
        let blocks = engine(8).project_transactions(txs.iter().collect());
        assert_eq!(blocks[0].n_tx, 1);
        assert_eq!(blocks[0].total_fees, 1_000);
    }

    #[test]
    fn test_large_tail_bucket_uses_finer_range() {
        let mut txs = vec![tx(0, 20_000_000, 4_000_000)];
        txs.extend((1..=5_000).map(|n| tx(n, 1_000, 400)));
        let blocks = engine(2).project_transactions(txs.iter().collect());
        assert_eq!(blocks[1].n_tx, 5_000);
        assert_eq!(blocks[1].fee_range.len(), 6);

        txs.extend((5_001..=10_001).map(|n| tx(n, 1_000, 400)));
        let blocks = engine(2).project_transactions(txs.iter().collect());
        assert_eq!(blocks[1].n_tx, 10_001);
        assert_eq!(blocks[1].fee_range.len(), 8);
    }

    #[test]
    fn test_projection_is_pure() {
        let mut store = MempoolStore::new(MempoolConfig::default());
        store.replace_all((0..40).map(|n| tx(n, 50_000 + (n % 7) * 1_000, 200_000)));
        let engine = engine(8);

        let first = engine.project(&store);
        let second = engine.project(&store);
        assert_eq!(first, second);
        let first_ids: Vec<_> = first.iter().flat_map(|b| b.transaction_ids.clone()).collect();
        let second_ids: Vec<_> = second.iter().flat_map(|b| b.transaction_ids.clone()).collect();
        assert_eq!(first_ids, second_ids);
    }

    #[test]
    fn test_empty_mempool() {
        let store = MempoolStore::new(MempoolConfig::default());
        assert!(engine(8).project(&store).is_empty());
    }
}
