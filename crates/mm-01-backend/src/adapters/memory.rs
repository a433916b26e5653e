//! Scripted in-memory upstream for tests.
//!
//! Holds a mempool id list, transaction records and a chain of blocks that
//! tests mutate between sync cycles. Failures, missing records and slow
//! fetches can be injected.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_types::{
    AddressStats, AddressSummary, Block, ExtendedTransaction, MempoolInfo, TxStatus, Txid, Vin,
    Vout,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::domain::BackendError;
use crate::ports::{BackendKind, BitcoinBackend};

/// Base timestamp of generated blocks.
const BLOCK_TIME_BASE: u64 = 1_700_000_000;

#[derive(Debug, Clone)]
struct MemoryBlock {
    block: Block,
    txids: Vec<Txid>,
}

#[derive(Default)]
struct MemoryState {
    mempool: Vec<Txid>,
    transactions: HashMap<Txid, ExtendedTransaction>,
    blocks: BTreeMap<u64, MemoryBlock>,
    mempool_info: Option<MempoolInfo>,
    missing: HashSet<Txid>,
    failing_calls: u32,
}

/// Deterministic 64-hex id derived from a tag and a number.
pub fn fake_hash(tag: u32, n: u64) -> String {
    format!("{tag:08x}{n:056x}")
}

/// Unconfirmed transaction with one RBF-signalling input spending `funding:0`.
pub fn mempool_transaction(txid: &str, fee: u64, weight: u64) -> ExtendedTransaction {
    ExtendedTransaction {
        txid: txid.to_string(),
        version: 2,
        fee,
        weight,
        size: weight / 4,
        vin: vec![Vin {
            txid: fake_hash(0xf0, fee),
            sequence: 0xffff_fffd,
            ..Default::default()
        }],
        vout: vec![Vout {
            value: 10_000,
            scriptpubkey_type: "v0_p2wpkh".to_string(),
            ..Default::default()
        }],
        status: TxStatus::unconfirmed(),
        ..Default::default()
    }
    .extend()
}

/// Scripted backend. Defaults to the indexer kind so address calls work.
pub struct InMemoryBackend {
    kind: BackendKind,
    state: RwLock<MemoryState>,
    fetch_delay: Mutex<Option<Duration>>,
    prevout_delay: Mutex<Option<Duration>>,
    transaction_fetches: AtomicU64,
    prevout_lookups: AtomicU64,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::with_kind(BackendKind::Esplora)
    }

    pub fn with_kind(kind: BackendKind) -> Self {
        Self {
            kind,
            state: RwLock::new(MemoryState::default()),
            fetch_delay: Mutex::new(None),
            prevout_delay: Mutex::new(None),
            transaction_fetches: AtomicU64::new(0),
            prevout_lookups: AtomicU64::new(0),
        }
    }

    /// Add a pending transaction (fetchable and listed in the mempool).
    pub fn add_mempool_transaction(&self, tx: ExtendedTransaction) {
        let mut state = self.state.write();
        if !state.mempool.contains(&tx.txid) {
            state.mempool.push(tx.txid.clone());
        }
        state.transactions.insert(tx.txid.clone(), tx.extend());
    }

    pub fn add_mempool_transactions(&self, txs: impl IntoIterator<Item = ExtendedTransaction>) {
        for tx in txs {
            self.add_mempool_transaction(tx);
        }
    }

    /// Drop ids from the mempool listing. Records stay fetchable.
    pub fn remove_from_mempool(&self, txids: &[Txid]) {
        let remove: HashSet<&Txid> = txids.iter().collect();
        self.state.write().mempool.retain(|txid| !remove.contains(txid));
    }

    /// Replace the listed mempool ids without touching records.
    pub fn set_mempool_ids(&self, txids: Vec<Txid>) {
        self.state.write().mempool = txids;
    }

    pub fn mempool_ids(&self) -> Vec<Txid> {
        self.state.read().mempool.clone()
    }

    pub fn set_mempool_info(&self, info: MempoolInfo) {
        self.state.write().mempool_info = Some(info);
    }

    /// Make fetches of `txid` fail with `NotFound`.
    pub fn mark_missing(&self, txid: &str) {
        self.state.write().missing.insert(txid.to_string());
    }

    /// Fail the next `calls` backend calls with a transient error.
    pub fn fail_next_calls(&self, calls: u32) {
        self.state.write().failing_calls = calls;
    }

    /// Sleep this long in every transaction fetch.
    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock() = Some(delay);
    }

    /// Sleep this long in every `add_prevouts` call.
    pub fn set_prevout_delay(&self, delay: Duration) {
        *self.prevout_delay.lock() = Some(delay);
    }

    /// Number of `get_raw_transaction` calls served so far.
    pub fn transaction_fetches(&self) -> u64 {
        self.transaction_fetches.load(Ordering::Relaxed)
    }

    /// Inputs resolved through `add_prevouts`.
    pub fn prevout_lookups(&self) -> u64 {
        self.prevout_lookups.load(Ordering::Relaxed)
    }

    pub fn tip(&self) -> Option<u64> {
        self.state.read().blocks.keys().next_back().copied()
    }

    /// Mine a block at the next height containing a fresh coinbase plus
    /// `txids`, which leave the mempool and become confirmed.
    pub fn mine_block(&self, txids: &[Txid]) -> Block {
        let mut state = self.state.write();
        let height = state
            .blocks
            .keys()
            .next_back()
            .map(|tip| tip + 1)
            .unwrap_or(0);
        let hash = fake_hash(0xb1, height);
        let timestamp = BLOCK_TIME_BASE + height * 600;

        let coinbase = ExtendedTransaction {
            txid: fake_hash(0xc0, height),
            weight: 400,
            vin: vec![Vin {
                is_coinbase: true,
                scriptsig: format!("03{height:06x}"),
                ..Default::default()
            }],
            vout: vec![
                Vout {
                    value: 312_500_000,
                    scriptpubkey_address: Some("bc1qminer".to_string()),
                    ..Default::default()
                },
                Vout {
                    value: 0,
                    scriptpubkey_type: "op_return".to_string(),
                    ..Default::default()
                },
            ],
            status: TxStatus::confirmed_in(height, hash.clone(), timestamp),
            ..Default::default()
        }
        .extend();

        let mut block_txids = vec![coinbase.txid.clone()];
        state.transactions.insert(coinbase.txid.clone(), coinbase);
        for txid in txids {
            if let Some(tx) = state.transactions.get_mut(txid) {
                tx.status = TxStatus::confirmed_in(height, hash.clone(), timestamp);
            }
            block_txids.push(txid.clone());
        }
        let confirmed: HashSet<&Txid> = txids.iter().collect();
        state.mempool.retain(|txid| !confirmed.contains(txid));

        let block = Block {
            id: hash,
            height,
            version: 0x2000_0000,
            timestamp,
            tx_count: block_txids.len() as u64,
            previousblockhash: height.checked_sub(1).map(|prev| fake_hash(0xb1, prev)),
            difficulty: 1.0,
            ..Default::default()
        };
        state.blocks.insert(
            height,
            MemoryBlock {
                block: block.clone(),
                txids: block_txids,
            },
        );
        block
    }

    /// Mine empty blocks until the tip reaches `height`.
    pub fn extend_chain_to(&self, height: u64) {
        while self.tip().map_or(true, |tip| tip < height) {
            self.mine_block(&[]);
        }
    }

    fn check_failure(&self) -> Result<(), BackendError> {
        let mut state = self.state.write();
        if state.failing_calls > 0 {
            state.failing_calls -= 1;
            return Err(BackendError::Transient("injected failure".into()));
        }
        Ok(())
    }

    fn check_address_support(&self) -> Result<(), BackendError> {
        if self.kind == BackendKind::Bitcoind {
            return Err(BackendError::Unsupported {
                backend: "bitcoind",
                operation: "address lookups",
            });
        }
        Ok(())
    }

    fn block_by_hash(&self, hash: &str) -> Result<MemoryBlock, BackendError> {
        self.state
            .read()
            .blocks
            .values()
            .find(|block| block.block.id == hash)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("block {hash}")))
    }
}

#[async_trait]
impl BitcoinBackend for InMemoryBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn get_raw_mempool(&self) -> Result<Vec<Txid>, BackendError> {
        self.check_failure()?;
        Ok(self.mempool_ids())
    }

    async fn get_raw_transaction(
        &self,
        txid: &str,
        _add_prevout: bool,
    ) -> Result<ExtendedTransaction, BackendError> {
        self.check_failure()?;
        self.transaction_fetches.fetch_add(1, Ordering::Relaxed);

        let delay = *self.fetch_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.read();
        if state.missing.contains(txid) {
            return Err(BackendError::NotFound(format!(
                "No such mempool or blockchain transaction: {txid}"
            )));
        }
        state.transactions.get(txid).cloned().ok_or_else(|| {
            BackendError::NotFound(format!("No such mempool or blockchain transaction: {txid}"))
        })
    }

    async fn add_prevouts(
        &self,
        mut tx: ExtendedTransaction,
    ) -> Result<ExtendedTransaction, BackendError> {
        self.check_failure()?;
        let delay = *self.prevout_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.read();
        for vin in tx.vin.iter_mut() {
            if vin.prevout.is_some() || vin.is_coinbase {
                continue;
            }
            self.prevout_lookups.fetch_add(1, Ordering::Relaxed);
            vin.prevout = state
                .transactions
                .get(&vin.txid)
                .and_then(|funding| funding.vout.get(vin.vout as usize))
                .cloned();
        }
        Ok(tx)
    }

    async fn get_block_height_tip(&self) -> Result<u64, BackendError> {
        self.check_failure()?;
        self.tip()
            .ok_or_else(|| BackendError::Transient("no blocks yet".into()))
    }

    async fn get_block_hash(&self, height: u64) -> Result<String, BackendError> {
        self.check_failure()?;
        self.state
            .read()
            .blocks
            .get(&height)
            .map(|block| block.block.id.clone())
            .ok_or_else(|| BackendError::NotFound(format!("height {height}")))
    }

    async fn get_block(&self, hash: &str) -> Result<Block, BackendError> {
        self.check_failure()?;
        Ok(self.block_by_hash(hash)?.block)
    }

    async fn get_tx_ids_for_block(&self, hash: &str) -> Result<Vec<Txid>, BackendError> {
        self.check_failure()?;
        Ok(self.block_by_hash(hash)?.txids)
    }

    async fn get_mempool_info(&self) -> Result<MempoolInfo, BackendError> {
        self.check_failure()?;
        let state = self.state.read();
        if let Some(info) = &state.mempool_info {
            return Ok(info.clone());
        }
        let bytes = state
            .mempool
            .iter()
            .filter_map(|txid| state.transactions.get(txid))
            .map(|tx| tx.vsize as u64)
            .sum();
        Ok(MempoolInfo {
            loaded: true,
            size: state.mempool.len() as u64,
            bytes,
            mempoolminfee: 0.00001,
            minrelaytxfee: 0.00001,
            ..Default::default()
        })
    }

    async fn get_address(&self, address: &str) -> Result<AddressSummary, BackendError> {
        self.check_failure()?;
        self.check_address_support()?;
        let state = self.state.read();
        let (mut chain, mut mempool) = (0u64, 0u64);
        for tx in state.transactions.values() {
            if tx.touches_address(address) {
                if tx.status.confirmed {
                    chain += 1;
                } else {
                    mempool += 1;
                }
            }
        }
        Ok(AddressSummary {
            address: address.to_string(),
            chain_stats: AddressStats {
                tx_count: chain,
                ..Default::default()
            },
            mempool_stats: AddressStats {
                tx_count: mempool,
                ..Default::default()
            },
        })
    }

    async fn get_address_transactions(
        &self,
        address: &str,
        _last_seen_txid: Option<&str>,
    ) -> Result<Vec<ExtendedTransaction>, BackendError> {
        self.check_failure()?;
        self.check_address_support()?;
        let state = self.state.read();
        let mut txs: Vec<ExtendedTransaction> = state
            .transactions
            .values()
            .filter(|tx| tx.touches_address(address))
            .cloned()
            .collect();
        txs.sort_by(|a, b| a.txid.cmp(&b.txid));
        Ok(txs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mine_block_moves_transactions() {
        let backend = InMemoryBackend::new();
        backend.extend_chain_to(5);
        let tx = mempool_transaction(&fake_hash(1, 1), 1000, 800);
        backend.add_mempool_transaction(tx.clone());

        let block = backend.mine_block(&[tx.txid.clone()]);

        assert_eq!(block.height, 6);
        assert!(backend.get_raw_mempool().await.unwrap().is_empty());
        let txids = backend.get_tx_ids_for_block(&block.id).await.unwrap();
        assert_eq!(txids.len(), 2);
        assert_eq!(txids[1], tx.txid);
        let fetched = backend.get_raw_transaction(&tx.txid, false).await.unwrap();
        assert!(fetched.status.confirmed);
        assert_eq!(backend.get_block_height_tip().await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let backend = InMemoryBackend::new();
        backend.fail_next_calls(1);
        assert!(backend.get_raw_mempool().await.unwrap_err().is_transient());
        assert!(backend.get_raw_mempool().await.is_ok());

        backend.mark_missing("ab");
        assert!(backend
            .get_raw_transaction("ab", false)
            .await
            .unwrap_err()
            .is_not_found());
    }
}
