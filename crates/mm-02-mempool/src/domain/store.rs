//! # Mempool Store
//!
//! Authoritative in-memory snapshot of the upstream mempool, refreshed once
//! per cycle by diffing the upstream id list against the local keys.
//!
//! Each refresh, in order:
//!
//! 1. insert newly fetched transactions (stamping `first_seen`)
//! 2. evaluate clear protection against the pre-insert size
//! 3. delete vanished transactions unless protection is active
//! 4. flip `in_sync` once the local size equals the upstream list length

use shared_bus::MempoolChange;
use shared_types::{ExtendedTransaction, MempoolInfo, Timestamp, TransactionStripped, Txid};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info};

use super::protection::ClearProtection;
use super::throughput::{Throughput, ThroughputWindow};
use crate::config::MempoolConfig;

#[derive(Debug, Clone)]
struct MempoolEntry {
    /// Insertion order, used as the projection tie-break.
    sequence: u64,
    tx: ExtendedTransaction,
}

/// Result of [`MempoolStore::apply_refresh`].
#[derive(Debug, Default)]
pub struct RefreshOutcome {
    /// Present only if transactions were added or deleted.
    pub change: Option<MempoolChange>,
    /// Present only if the loading progress moved.
    pub loading_progress: Option<u8>,
    /// True on the cycle that brought the store in sync.
    pub became_in_sync: bool,
}

pub struct MempoolStore {
    entries: HashMap<Txid, MempoolEntry>,
    next_sequence: u64,
    in_sync: bool,
    protection: ClearProtection,
    throughput: ThroughputWindow,
    recent: VecDeque<TransactionStripped>,
    recent_capacity: usize,
    mempool_info: MempoolInfo,
    loading_progress: u8,
}

impl MempoolStore {
    pub fn new(config: MempoolConfig) -> Self {
        Self {
            entries: HashMap::new(),
            next_sequence: 0,
            in_sync: false,
            protection: ClearProtection::new(config.clear_protection),
            throughput: ThroughputWindow::new(config.throughput_sample_period),
            recent: VecDeque::with_capacity(config.recent_transactions),
            recent_capacity: config.recent_transactions,
            mempool_info: MempoolInfo::default(),
            loading_progress: 0,
        }
    }

    fn insert_entry(&mut self, tx: ExtendedTransaction) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries
            .insert(tx.txid.clone(), MempoolEntry { sequence, tx });
    }

    /// Reconcile the snapshot with the upstream id list.
    ///
    /// `fetched` holds the transactions retrieved this cycle for ids that
    /// were not known locally; it may be a prefix of what is missing when the
    /// fetch budget ran out.
    pub fn apply_refresh(
        &mut self,
        upstream: &[Txid],
        fetched: Vec<ExtendedTransaction>,
        now: Timestamp,
    ) -> RefreshOutcome {
        let size_before = self.entries.len();
        let was_in_sync = self.in_sync;
        debug!(
            upstream = upstream.len(),
            local = size_before,
            diff = upstream.len() as i64 - size_before as i64,
            "Refreshing mempool"
        );

        let mut new_transactions = Vec::new();
        for mut tx in fetched {
            if self.entries.contains_key(&tx.txid) {
                continue;
            }
            if !tx.status.confirmed && tx.first_seen.is_none() {
                tx.first_seen = Some(now / 1000);
            }
            if was_in_sync {
                self.throughput.record(now, tx.vsize);
            }
            new_transactions.push(tx.clone());
            self.insert_entry(tx);
        }
        self.throughput.trim(now);
        self.push_recent(&new_transactions);

        if self.protection.evaluate(size_before, upstream.len(), now) {
            self.in_sync = false;
        }

        let mut deleted_transactions = Vec::new();
        if self.protection.allow_deletions() {
            let upstream_ids: HashSet<&str> = upstream.iter().map(String::as_str).collect();
            let vanished: Vec<Txid> = self
                .entries
                .keys()
                .filter(|txid| !upstream_ids.contains(txid.as_str()))
                .cloned()
                .collect();
            deleted_transactions = vanished
                .iter()
                .filter_map(|txid| self.entries.remove(txid))
                .map(|entry| entry.tx)
                .collect();
        }

        let mut became_in_sync = false;
        if !self.in_sync && upstream.len() == self.entries.len() {
            self.in_sync = true;
            became_in_sync = true;
            info!(size = self.entries.len(), "The mempool is now in sync");
        }

        let progress = self.compute_loading_progress(upstream.len());
        let loading_progress = (progress != self.loading_progress).then(|| {
            self.loading_progress = progress;
            progress
        });

        let change = if new_transactions.is_empty() && deleted_transactions.is_empty() {
            None
        } else {
            debug!(
                added = new_transactions.len(),
                deleted = deleted_transactions.len(),
                size = self.entries.len(),
                "Mempool changed"
            );
            Some(MempoolChange {
                new_transactions,
                deleted_transactions,
            })
        };

        RefreshOutcome {
            change,
            loading_progress,
            became_in_sync,
        }
    }

    fn compute_loading_progress(&self, upstream_len: usize) -> u8 {
        if self.in_sync || upstream_len == 0 {
            return 100;
        }
        (self.entries.len() * 100 / upstream_len).min(100) as u8
    }

    fn push_recent(&mut self, new_transactions: &[ExtendedTransaction]) {
        if new_transactions.is_empty() {
            return;
        }
        let mut recent: VecDeque<TransactionStripped> = new_transactions
            .iter()
            .take(self.recent_capacity)
            .map(ExtendedTransaction::stripped)
            .collect();
        recent.extend(self.recent.drain(..));
        recent.truncate(self.recent_capacity);
        self.recent = recent;
    }

    /// Remove transactions outside the regular refresh (block confirmations).
    pub fn remove(&mut self, txids: &[Txid]) -> Vec<ExtendedTransaction> {
        txids
            .iter()
            .filter_map(|txid| self.entries.remove(txid))
            .map(|entry| entry.tx)
            .collect()
    }

    /// Replace the whole snapshot, e.g. from a disk restore. Insertion order
    /// follows the iterator.
    pub fn replace_all(&mut self, transactions: impl IntoIterator<Item = ExtendedTransaction>) {
        self.entries.clear();
        self.next_sequence = 0;
        for tx in transactions {
            self.insert_entry(tx);
        }
    }

    pub fn get(&self, txid: &str) -> Option<&ExtendedTransaction> {
        self.entries.get(txid).map(|entry| &entry.tx)
    }

    pub fn contains(&self, txid: &str) -> bool {
        self.entries.contains_key(txid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All transactions in insertion order.
    pub fn transactions(&self) -> Vec<&ExtendedTransaction> {
        let mut entries: Vec<&MempoolEntry> = self.entries.values().collect();
        entries.sort_by_key(|entry| entry.sequence);
        entries.into_iter().map(|entry| &entry.tx).collect()
    }

    /// Transaction ids in insertion order.
    pub fn txids(&self) -> Vec<Txid> {
        self.transactions()
            .into_iter()
            .map(|tx| tx.txid.clone())
            .collect()
    }

    pub fn is_in_sync(&self) -> bool {
        self.in_sync
    }

    pub fn set_out_of_sync(&mut self) {
        self.in_sync = false;
    }

    pub fn is_protecting(&self) -> bool {
        self.protection.is_protecting()
    }

    /// First-seen unix seconds per id, 0 when unknown.
    pub fn first_seen_for(&self, txids: &[Txid]) -> Vec<u64> {
        txids
            .iter()
            .map(|txid| {
                self.get(txid)
                    .and_then(|tx| tx.first_seen)
                    .unwrap_or_default()
            })
            .collect()
    }

    pub fn recent_transactions(&self) -> Vec<TransactionStripped> {
        self.recent.iter().cloned().collect()
    }

    pub fn throughput(&self, now: Timestamp) -> Throughput {
        self.throughput.rates(now)
    }

    pub fn mempool_info(&self) -> &MempoolInfo {
        &self.mempool_info
    }

    pub fn set_mempool_info(&mut self, info: MempoolInfo) {
        self.mempool_info = info;
    }

    pub fn loading_progress(&self) -> u8 {
        self.loading_progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClearProtectionConfig;
    use shared_types::TxStatus;

    fn tx(n: u64) -> ExtendedTransaction {
        ExtendedTransaction {
            txid: format!("{n:064x}"),
            fee: 1000 + n,
            weight: 800,
            ..Default::default()
        }
        .extend()
    }

    fn ids(range: std::ops::Range<u64>) -> Vec<Txid> {
        range.map(|n| format!("{n:064x}")).collect()
    }

    fn store() -> MempoolStore {
        MempoolStore::new(MempoolConfig::default())
    }

    #[test]
    fn test_refresh_converges_and_flips_in_sync() {
        let mut store = store();
        let upstream = ids(0..10);

        let outcome = store.apply_refresh(&upstream, (0..4).map(tx).collect(), 1_000);
        assert!(!store.is_in_sync());
        assert_eq!(outcome.change.map(|c| c.new_transactions.len()), Some(4));
        assert_eq!(outcome.loading_progress, Some(40));

        let outcome = store.apply_refresh(&upstream, (4..10).map(tx).collect(), 2_000);
        assert!(outcome.became_in_sync);
        assert!(store.is_in_sync());
        assert_eq!(outcome.loading_progress, Some(100));

        let mut local = store.txids();
        local.sort();
        assert_eq!(local, upstream);

        // Nothing new, nothing deleted: no change notification.
        let outcome = store.apply_refresh(&upstream, Vec::new(), 3_000);
        assert!(outcome.change.is_none());
        assert!(outcome.loading_progress.is_none());
    }

    #[test]
    fn test_vanished_transactions_are_deleted() {
        let mut store = store();
        store.apply_refresh(&ids(0..5), (0..5).map(tx).collect(), 0);

        let outcome = store.apply_refresh(&ids(2..6), vec![tx(5)], 1_000);
        let change = outcome.change.unwrap();
        assert_eq!(change.new_transactions.len(), 1);
        let mut deleted: Vec<Txid> = change
            .deleted_transactions
            .iter()
            .map(|tx| tx.txid.clone())
            .collect();
        deleted.sort();
        assert_eq!(deleted, ids(0..2));
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_first_seen_is_set_once_for_unconfirmed() {
        let mut store = store();
        let mut confirmed = tx(2);
        confirmed.status = TxStatus::confirmed_in(1, "00", 1);

        store.apply_refresh(&ids(0..3), vec![tx(0), tx(1), confirmed], 42_000);
        assert_eq!(store.first_seen_for(&ids(0..4)), vec![42, 42, 0, 0]);

        // Re-applying a known transaction does not restamp it.
        store.apply_refresh(&ids(0..3), vec![tx(0)], 99_000);
        assert_eq!(store.get(&ids(0..1)[0]).unwrap().first_seen, Some(42));
    }

    #[test]
    fn test_clear_protection_suppresses_deletions() {
        let config = MempoolConfig::default();
        let mut store = MempoolStore::new(config.clone());
        let all = ids(0..25_000);
        store.replace_all((0..25_000).map(tx));
        store.apply_refresh(&all, Vec::new(), 0);
        assert!(store.is_in_sync());

        let shrunk = ids(0..15_000);
        let outcome = store.apply_refresh(&shrunk, Vec::new(), 1_000);
        assert!(outcome.change.is_none());
        assert_eq!(store.len(), 25_000);
        assert!(store.is_protecting());
        assert!(!store.is_in_sync());

        // Still within the cooldown.
        store.apply_refresh(&shrunk, Vec::new(), 5 * 60 * 1000);
        assert_eq!(store.len(), 25_000);

        let after_cooldown = 1_000 + config.clear_protection.cooldown.as_millis() as u64;
        let outcome = store.apply_refresh(&shrunk, Vec::new(), after_cooldown);
        assert_eq!(outcome.change.unwrap().deleted_transactions.len(), 10_000);
        assert_eq!(store.len(), 15_000);
        assert!(store.is_in_sync());
    }

    #[test]
    fn test_protection_thresholds_are_configurable() {
        let config = MempoolConfig {
            clear_protection: ClearProtectionConfig {
                min_size: 10,
                ratio: 0.5,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut store = MempoolStore::new(config);
        store.apply_refresh(&ids(0..20), (0..20).map(tx).collect(), 0);

        // 15/20 = 0.75 > 0.5: a real drop, deleted immediately.
        store.apply_refresh(&ids(0..15), Vec::new(), 1);
        assert_eq!(store.len(), 15);

        // 5/15 <= 0.5: protected.
        store.apply_refresh(&ids(0..5), Vec::new(), 2);
        assert_eq!(store.len(), 15);
    }

    #[test]
    fn test_recent_ring_keeps_newest_six() {
        let mut store = store();
        store.apply_refresh(&ids(0..4), (0..4).map(tx).collect(), 0);
        store.apply_refresh(&ids(0..8), (4..8).map(tx).collect(), 1);

        let recent: Vec<Txid> = store
            .recent_transactions()
            .into_iter()
            .map(|tx| tx.txid)
            .collect();
        assert_eq!(recent.len(), 6);
        assert_eq!(recent[..4], ids(4..8)[..]);
        assert_eq!(recent[4..], ids(0..2)[..]);
    }

    #[test]
    fn test_throughput_only_counts_while_in_sync() {
        let mut store = store();
        store.apply_refresh(&ids(0..2), (0..2).map(tx).collect(), 0);
        assert_eq!(store.throughput(0).tx_per_second, 0.0);
        assert!(store.is_in_sync());

        store.apply_refresh(&ids(0..5), (2..5).map(tx).collect(), 1_000);
        let rates = store.throughput(1_000);
        assert_eq!(rates.tx_per_second, 3.0 / 150.0);
        assert_eq!(rates.vbytes_per_second, 600.0 / 150.0);
    }

    #[test]
    fn test_remove_and_insertion_order() {
        let mut store = store();
        store.replace_all(vec![tx(3), tx(1), tx(2)]);
        assert_eq!(store.txids(), vec![tx(3).txid, tx(1).txid, tx(2).txid]);

        let removed = store.remove(&[tx(1).txid, "unknown".to_string()]);
        assert_eq!(removed.len(), 1);
        assert_eq!(store.len(), 2);
    }
}
