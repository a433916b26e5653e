//! Replace-by-fee detection over one cycle's added and removed sets.
//!
//! A removed transaction is replaced by the first added transaction that pays
//! a strictly higher fee and feerate and spends from a transaction it also
//! spends from. Inputs are matched on the funding txid only, not the full
//! outpoint.

use shared_types::{ExtendedTransaction, Txid};
use std::collections::HashMap;

/// Map of replaced txid to its replacement.
pub fn find_rbf_transactions(
    added: &[ExtendedTransaction],
    removed: &[ExtendedTransaction],
) -> HashMap<Txid, ExtendedTransaction> {
    let mut matches = HashMap::new();

    for replaced in removed.iter().filter(|tx| tx.signals_rbf()) {
        let replacement = added.iter().find(|candidate| {
            candidate.fee > replaced.fee
                && candidate.feerate() > replaced.feerate()
                && candidate.vin.iter().any(|vin| {
                    replaced
                        .vin
                        .iter()
                        .any(|replaced_vin| replaced_vin.txid == vin.txid)
                })
        });
        if let Some(replacement) = replacement {
            matches.insert(replaced.txid.clone(), replacement.clone());
        }
    }

    matches
}
