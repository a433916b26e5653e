//! Per-block statistics computed at ingestion.

use shared_types::{fees_in_range, median, Block, ExtendedBlock, ExtendedTransaction};

/// Samples in a block's fee range.
pub const BLOCK_FEE_RANGE_LENGTH: usize = 8;

/// Build the stored block from its header and resolved transactions.
///
/// `transactions[0]` must be the coinbase. Returns the block together with
/// the transactions sorted by descending feerate.
pub fn extend_block(
    block: Block,
    mut transactions: Vec<ExtendedTransaction>,
) -> (ExtendedBlock, Vec<ExtendedTransaction>) {
    let (reward, coinbase_tx) = transactions
        .first()
        .map(|coinbase| (coinbase.total_output_value(), coinbase.strip_coinbase()))
        .unwrap_or_default();

    transactions.sort_by(|a, b| b.feerate().total_cmp(&a.feerate()));
    let feerates: Vec<f64> = transactions.iter().map(ExtendedTransaction::feerate).collect();

    let (median_fee, fee_range) = if feerates.len() > 1 {
        (
            median(&feerates),
            fees_in_range(&feerates[..feerates.len() - 1], BLOCK_FEE_RANGE_LENGTH),
        )
    } else {
        (0.0, vec![0.0, 0.0])
    };

    let extended = ExtendedBlock {
        block,
        reward,
        coinbase_tx,
        median_fee,
        fee_range,
        match_rate: None,
        transactions: transactions.iter().map(ExtendedTransaction::stripped).collect(),
    };
    (extended, transactions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{Vin, Vout};

    fn coinbase() -> ExtendedTransaction {
        ExtendedTransaction {
            txid: "cb".to_string(),
            weight: 400,
            vin: vec![Vin {
                is_coinbase: true,
                scriptsig: "03aabbcc".to_string(),
                ..Default::default()
            }],
            vout: vec![
                Vout {
                    value: 625_000_000,
                    scriptpubkey_address: Some("bc1qpool".to_string()),
                    ..Default::default()
                },
                Vout::default(),
            ],
            ..Default::default()
        }
        .extend()
    }

    fn paying(txid: &str, fee: u64) -> ExtendedTransaction {
        ExtendedTransaction {
            txid: txid.to_string(),
            fee,
            weight: 400,
            ..Default::default()
        }
        .extend()
    }

    #[test]
    fn test_block_statistics() {
        let txs = vec![
            coinbase(),
            paying("a", 500),
            paying("b", 2_000),
            paying("c", 1_000),
        ];
        let (block, sorted) = extend_block(Block::default(), txs);

        assert_eq!(block.reward, 625_000_000);
        assert_eq!(block.coinbase_tx.vin[0].scriptsig, "03aabbcc");
        assert_eq!(block.coinbase_tx.vout.len(), 1);

        let order: Vec<&str> = sorted.iter().map(|tx| tx.txid.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a", "cb"]);
        assert_eq!(block.transactions[0].txid, "b");

        // Feerates [20, 10, 5, 1]: median over all, range without the lowest.
        assert_eq!(block.median_fee, 7.5);
        assert_eq!(block.fee_range.len(), 8);
        assert_eq!(block.fee_range[0], 5.0);
        assert_eq!(block.fee_range[7], 20.0);
    }

    #[test]
    fn test_coinbase_only_block() {
        let (block, _) = extend_block(Block::default(), vec![coinbase()]);
        assert_eq!(block.median_fee, 0.0);
        assert_eq!(block.fee_range, vec![0.0, 0.0]);
        assert_eq!(block.reward, 625_000_000);
    }
}
