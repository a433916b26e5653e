//! Bitcoin Core RPC backend.
//!
//! Rebuilds indexer-style transactions from `getrawtransaction` output. The
//! node does not report fees for arbitrary transactions, so they are derived:
//!
//! | Case | Fee source |
//! |------|------------|
//! | coinbase | 0 |
//! | confirmed | Σ resolved prevout values − Σ outputs |
//! | unconfirmed | `fees.base` from the bulk `getrawmempool true` cache, `getmempoolentry` on miss |

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use shared_types::{AddressSummary, Block, ExtendedTransaction, MempoolInfo, Txid, Vout};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::rpc_client::CoreRpcClient;
use crate::config::CoreRpcConfig;
use crate::domain::normalizer::{GENESIS_BLOCK_HASH, GENESIS_BLOCK_TIME, GENESIS_COINBASE_TXID};
use crate::domain::{
    btc_to_sats, BackendError, RpcBlock, RpcMempoolEntry, RpcTransaction, TransactionNormalizer,
};
use crate::ports::{BackendKind, BitcoinBackend};

type RawMempoolCache = Arc<HashMap<Txid, RpcMempoolEntry>>;

#[derive(Debug, Deserialize)]
struct ChainTip {
    height: u64,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct BlockTxids {
    tx: Vec<Txid>,
}

/// Txids of the block last read by `get_block`.
struct FetchedBlockTxids {
    hash: String,
    txids: Vec<Txid>,
}

/// `validateaddress` result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidatedAddress {
    pub isvalid: bool,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(rename = "scriptPubKey", default)]
    pub script_pub_key: Option<String>,
}

/// Full-node backend over JSON-RPC.
pub struct BitcoindBackend {
    rpc: CoreRpcClient,
    /// Last tip seen via `getchaintips`, used to derive confirmed heights.
    tip_height: AtomicU64,
    /// Bulk mempool entries, dropped on every `getrawmempool` refresh.
    raw_mempool_cache: Mutex<Option<RawMempoolCache>>,
    /// Consumed by the `get_tx_ids_for_block` call that follows `get_block`.
    last_block_txids: Mutex<Option<FetchedBlockTxids>>,
}

impl BitcoindBackend {
    pub fn new(config: &CoreRpcConfig) -> Self {
        Self {
            rpc: CoreRpcClient::new(config),
            tip_height: AtomicU64::new(0),
            raw_mempool_cache: Mutex::new(None),
            last_block_txids: Mutex::new(None),
        }
    }

    pub async fn validate_address(&self, address: &str) -> Result<ValidatedAddress, BackendError> {
        self.rpc.call("validateaddress", json!([address])).await
    }

    async fn current_tip(&self) -> Result<u64, BackendError> {
        match self.tip_height.load(Ordering::Relaxed) {
            0 => self.get_block_height_tip().await,
            tip => Ok(tip),
        }
    }

    async fn fetch_rpc_transaction(&self, txid: &str) -> Result<RpcTransaction, BackendError> {
        self.rpc.call("getrawtransaction", json!([txid, true])).await
    }

    /// Output `index` of `txid`, normalized.
    async fn fetch_output(&self, txid: &str, index: u32) -> Result<Vout, BackendError> {
        let funding = self.fetch_rpc_transaction(txid).await?;
        funding
            .vout
            .iter()
            .find(|vout| vout.n == index)
            .or_else(|| funding.vout.get(index as usize))
            .map(TransactionNormalizer::normalize_vout)
            .ok_or_else(|| BackendError::NotFound(format!("output {txid}:{index}")))
    }

    async fn convert_transaction(
        &self,
        rpc: &RpcTransaction,
        add_prevout: bool,
    ) -> Result<ExtendedTransaction, BackendError> {
        let tip = self.current_tip().await?;
        let mut tx = TransactionNormalizer::normalize_transaction(rpc, tip);

        if tx.status.confirmed {
            self.calculate_fee_from_inputs(&mut tx, add_prevout).await?;
        } else {
            self.append_mempool_fee(&mut tx).await?;
            if add_prevout {
                self.resolve_prevouts(&mut tx).await?;
            }
        }

        tx.refresh_derived();
        Ok(tx)
    }

    async fn calculate_fee_from_inputs(
        &self,
        tx: &mut ExtendedTransaction,
        add_prevout: bool,
    ) -> Result<(), BackendError> {
        if tx.is_coinbase() {
            tx.fee = 0;
            return Ok(());
        }

        let mut total_in = 0u64;
        for vin in tx.vin.iter_mut() {
            let prevout = self.fetch_output(&vin.txid, vin.vout).await?;
            total_in += prevout.value;
            if add_prevout {
                vin.prevout = Some(prevout);
            }
        }
        tx.fee = total_in.saturating_sub(tx.total_output_value());
        Ok(())
    }

    async fn append_mempool_fee(&self, tx: &mut ExtendedTransaction) -> Result<(), BackendError> {
        if tx.fee > 0 {
            return Ok(());
        }

        let cached = self.raw_mempool_cache.lock().clone();
        let cache = match cached {
            Some(cache) => cache,
            None => {
                let entries: HashMap<Txid, RpcMempoolEntry> =
                    self.rpc.call("getrawmempool", json!([true])).await?;
                debug!(entries = entries.len(), "Cached verbose raw mempool");
                let cache = Arc::new(entries);
                *self.raw_mempool_cache.lock() = Some(cache.clone());
                cache
            }
        };

        let entry = match cache.get(&tx.txid) {
            Some(entry) => entry.clone(),
            None => {
                self.rpc
                    .call::<RpcMempoolEntry>("getmempoolentry", json!([tx.txid]))
                    .await?
            }
        };
        tx.fee = btc_to_sats(entry.fees.base);
        Ok(())
    }

    async fn resolve_prevouts(&self, tx: &mut ExtendedTransaction) -> Result<(), BackendError> {
        for vin in tx.vin.iter_mut() {
            if vin.prevout.is_some() || vin.is_coinbase {
                continue;
            }
            vin.prevout = Some(self.fetch_output(&vin.txid, vin.vout).await?);
        }
        Ok(())
    }

    /// The genesis coinbase is not indexed by the node; read it from the block.
    async fn genesis_coinbase(&self) -> Result<ExtendedTransaction, BackendError> {
        let block: RpcBlock = self
            .rpc
            .call("getblock", json!([GENESIS_BLOCK_HASH, 2]))
            .await?;
        let first = block
            .tx
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::InvalidResponse("genesis block has no tx".into()))?;
        let mut rpc: RpcTransaction = serde_json::from_value(first)?;

        let tip = self.current_tip().await?;
        rpc.confirmations = Some(tip + 1);
        rpc.blockhash = Some(GENESIS_BLOCK_HASH.to_string());
        rpc.blocktime = Some(GENESIS_BLOCK_TIME);
        self.convert_transaction(&rpc, false).await
    }
}

#[async_trait]
impl BitcoinBackend for BitcoindBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Bitcoind
    }

    async fn get_raw_mempool(&self) -> Result<Vec<Txid>, BackendError> {
        *self.raw_mempool_cache.lock() = None;
        self.rpc.call("getrawmempool", json!([])).await
    }

    async fn get_raw_transaction(
        &self,
        txid: &str,
        add_prevout: bool,
    ) -> Result<ExtendedTransaction, BackendError> {
        if txid == GENESIS_COINBASE_TXID {
            return self.genesis_coinbase().await;
        }
        let rpc = self.fetch_rpc_transaction(txid).await?;
        self.convert_transaction(&rpc, add_prevout).await
    }

    async fn add_prevouts(
        &self,
        mut tx: ExtendedTransaction,
    ) -> Result<ExtendedTransaction, BackendError> {
        self.resolve_prevouts(&mut tx).await?;
        Ok(tx)
    }

    async fn get_block_height_tip(&self) -> Result<u64, BackendError> {
        let tips: Vec<ChainTip> = self.rpc.call("getchaintips", json!([])).await?;
        let tip = tips
            .iter()
            .find(|tip| tip.status == "active")
            .or_else(|| tips.first())
            .map(|tip| tip.height)
            .ok_or_else(|| BackendError::InvalidResponse("getchaintips returned nothing".into()))?;
        self.tip_height.store(tip, Ordering::Relaxed);
        Ok(tip)
    }

    async fn get_block_hash(&self, height: u64) -> Result<String, BackendError> {
        self.rpc.call("getblockhash", json!([height])).await
    }

    async fn get_block(&self, hash: &str) -> Result<Block, BackendError> {
        let block: RpcBlock = self.rpc.call("getblock", json!([hash, 1])).await?;
        let txids = block
            .tx
            .iter()
            .filter_map(|txid| txid.as_str().map(str::to_string))
            .collect();
        *self.last_block_txids.lock() = Some(FetchedBlockTxids {
            hash: hash.to_string(),
            txids,
        });
        Ok(TransactionNormalizer::normalize_block(&block))
    }

    async fn get_tx_ids_for_block(&self, hash: &str) -> Result<Vec<Txid>, BackendError> {
        let fetched = {
            let mut last = self.last_block_txids.lock();
            match last.take() {
                Some(fetched) if fetched.hash == hash => Some(fetched.txids),
                other => {
                    *last = other;
                    None
                }
            }
        };
        if let Some(txids) = fetched {
            return Ok(txids);
        }
        let block: BlockTxids = self.rpc.call("getblock", json!([hash, 1])).await?;
        Ok(block.tx)
    }

    async fn get_mempool_info(&self) -> Result<MempoolInfo, BackendError> {
        self.rpc.call("getmempoolinfo", json!([])).await
    }

    async fn get_address(&self, _address: &str) -> Result<AddressSummary, BackendError> {
        Err(BackendError::Unsupported {
            backend: "bitcoind",
            operation: "address lookup",
        })
    }

    async fn get_address_transactions(
        &self,
        _address: &str,
        _last_seen_txid: Option<&str>,
    ) -> Result<Vec<ExtendedTransaction>, BackendError> {
        Err(BackendError::Unsupported {
            backend: "bitcoind",
            operation: "address history",
        })
    }
}
