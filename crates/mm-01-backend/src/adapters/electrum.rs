//! # Electrum Backend
//!
//! Address balances and histories come from an Electrum server over
//! newline-delimited JSON-RPC on TCP. Everything else is served by the
//! full-node RPC backend it wraps.
//!
//! ```text
//! get_address ──validateaddress──→ scriptPubKey ──sha256, reversed──→ script hash
//!                                                     │
//!                 blockchain.scripthash.get_balance ←─┤
//!                 blockchain.scripthash.get_history ←─┘ (cached 2s)
//! ```

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use shared_types::{AddressStats, AddressSummary, Block, ExtendedTransaction, MempoolInfo, Txid};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::bitcoind::BitcoindBackend;
use crate::config::{CoreRpcConfig, ElectrumConfig};
use crate::domain::errors::CAPACITY_EXCEEDED_MESSAGE;
use crate::domain::{electrum_script_hash, BackendError, ExpiringCache};
use crate::ports::{BackendKind, BitcoinBackend};

/// How long a script hash history stays cached.
pub const HISTORY_CACHE_TTL: Duration = Duration::from_secs(2);

/// Page size of `get_address_transactions`.
const ADDRESS_TXS_PAGE_SIZE: usize = 10;

/// Sort key standing in for "unconfirmed" so those entries come first.
const UNCONFIRMED_SORT_HEIGHT: i64 = 9_999_999;

const CLIENT_NAME: &str = "mempool-mirror";
const PROTOCOL_VERSION: &str = "1.4";

/// One `blockchain.scripthash.get_history` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryEntry {
    pub tx_hash: Txid,
    /// Confirmation height; 0 or -1 for mempool entries.
    pub height: i64,
    /// Only present on mempool entries.
    #[serde(default)]
    pub fee: Option<u64>,
}

impl HistoryEntry {
    pub fn is_unconfirmed(&self) -> bool {
        self.fee.is_some() || self.height <= 0
    }

    fn sort_height(&self) -> i64 {
        if self.height <= 0 {
            UNCONFIRMED_SORT_HEIGHT
        } else {
            self.height
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ScriptHashBalance {
    confirmed: i64,
    unconfirmed: i64,
}

/// Order newest first (mempool entries on top) and pick the page that
/// follows `last_seen_txid`.
pub fn history_page<'a>(
    history: &'a mut [HistoryEntry],
    last_seen_txid: Option<&str>,
) -> &'a [HistoryEntry] {
    history.sort_by(|a, b| b.sort_height().cmp(&a.sort_height()));

    let start = last_seen_txid
        .and_then(|last_seen| history.iter().position(|entry| entry.tx_hash == last_seen))
        .map(|position| position + 1)
        .unwrap_or(0);
    let end = (start + ADDRESS_TXS_PAGE_SIZE).min(history.len());
    &history[start.min(end)..end]
}

/// Map an Electrum server error string to a backend error.
pub fn classify_server_error(message: &str) -> BackendError {
    let lower = message.to_lowercase();
    if lower.contains("failed to get confirmed status")
        || lower.contains("too large")
        || lower.contains("history too long")
        || lower.contains("exceeds")
    {
        BackendError::CapacityExceeded(CAPACITY_EXCEEDED_MESSAGE.to_string())
    } else {
        BackendError::Transient(format!("electrum: {message}"))
    }
}

fn stats_from_balance(balance: i64, tx_count: u64) -> AddressStats {
    AddressStats {
        funded_txo_sum: balance.max(0) as u64,
        spent_txo_sum: balance.min(0).unsigned_abs(),
        tx_count,
        ..Default::default()
    }
}

enum ExchangeFailure {
    /// The server answered with an error object.
    Server(String),
    /// The connection is unusable and must be re-established.
    Connection(String),
}

struct ElectrumConnection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl ElectrumConnection {
    async fn exchange(
        &mut self,
        id: u64,
        method: &str,
        params: Value,
    ) -> Result<Value, ExchangeFailure> {
        let request = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        let mut line = request.to_string();
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ExchangeFailure::Connection(e.to_string()))?;

        loop {
            let mut response = String::new();
            let read = self
                .reader
                .read_line(&mut response)
                .await
                .map_err(|e| ExchangeFailure::Connection(e.to_string()))?;
            if read == 0 {
                return Err(ExchangeFailure::Connection("connection closed".into()));
            }

            let value: Value = serde_json::from_str(&response)
                .map_err(|e| ExchangeFailure::Connection(format!("malformed frame: {e}")))?;
            // Subscription notifications carry no id.
            if value.get("id").and_then(Value::as_u64) != Some(id) {
                continue;
            }
            if let Some(error) = value.get("error").filter(|error| !error.is_null()) {
                let message = error
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string());
                return Err(ExchangeFailure::Server(message));
            }
            return Ok(value.get("result").cloned().unwrap_or(Value::Null));
        }
    }
}

/// Single-connection Electrum client that reconnects lazily.
pub struct ElectrumClient {
    address: String,
    connection: Mutex<Option<ElectrumConnection>>,
    request_id: AtomicU64,
}

impl ElectrumClient {
    pub fn new(config: &ElectrumConfig) -> Self {
        Self {
            address: format!("{}:{}", config.host, config.port),
            connection: Mutex::new(None),
            request_id: AtomicU64::new(1),
        }
    }

    async fn connect(&self) -> Result<ElectrumConnection, BackendError> {
        let stream = TcpStream::connect(&self.address).await?;
        let (read_half, write_half) = stream.into_split();
        let mut connection = ElectrumConnection {
            reader: BufReader::new(read_half),
            writer: write_half,
        };

        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let version = connection
            .exchange(id, "server.version", json!([CLIENT_NAME, PROTOCOL_VERSION]))
            .await
            .map_err(|failure| match failure {
                ExchangeFailure::Server(message) | ExchangeFailure::Connection(message) => {
                    BackendError::Transient(format!("electrum handshake: {message}"))
                }
            })?;

        info!(address = %self.address, version = %version, "Connected to Electrum server");
        Ok(connection)
    }

    pub async fn request<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<R, BackendError> {
        let mut guard = self.connection.lock().await;
        if guard.is_none() {
            *guard = Some(self.connect().await?);
        }
        let Some(connection) = guard.as_mut() else {
            return Err(BackendError::Transient("electrum: not connected".into()));
        };

        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        match connection.exchange(id, method, params).await {
            Ok(value) => Ok(serde_json::from_value(value)?),
            Err(ExchangeFailure::Server(message)) => Err(classify_server_error(&message)),
            Err(ExchangeFailure::Connection(message)) => {
                *guard = None;
                warn!(address = %self.address, error = %message, "Disconnected from Electrum server");
                Err(BackendError::Transient(format!("electrum: {message}")))
            }
        }
    }
}

/// Electrum for addresses, Bitcoin Core for the rest.
pub struct ElectrumBackend {
    node: BitcoindBackend,
    client: ElectrumClient,
    history_cache: Arc<ExpiringCache<String, Vec<HistoryEntry>>>,
}

impl ElectrumBackend {
    pub fn new(core_rpc: &CoreRpcConfig, electrum: &ElectrumConfig) -> Self {
        Self {
            node: BitcoindBackend::new(core_rpc),
            client: ElectrumClient::new(electrum),
            history_cache: Arc::new(ExpiringCache::new(HISTORY_CACHE_TTL)),
        }
    }

    /// Cache handle for the background sweep.
    pub fn history_cache(&self) -> Arc<ExpiringCache<String, Vec<HistoryEntry>>> {
        self.history_cache.clone()
    }

    async fn script_hash_history(
        &self,
        script_hash: &str,
    ) -> Result<Vec<HistoryEntry>, BackendError> {
        if let Some(history) = self.history_cache.get(&script_hash.to_string()) {
            return Ok(history);
        }
        let history: Vec<HistoryEntry> = self
            .client
            .request("blockchain.scripthash.get_history", json!([script_hash]))
            .await?;
        self.history_cache
            .insert(script_hash.to_string(), history.clone());
        Ok(history)
    }

    /// Script hash of a valid address, `None` for invalid ones.
    async fn address_script_hash(
        &self,
        address: &str,
    ) -> Result<Option<(String, String)>, BackendError> {
        let info = self.node.validate_address(address).await?;
        let script = match (info.isvalid, info.script_pub_key) {
            (true, Some(script)) => script,
            _ => return Ok(None),
        };
        let script_hash = electrum_script_hash(&script)
            .ok_or_else(|| BackendError::InvalidResponse(format!("script for {address}")))?;
        Ok(Some((
            info.address.unwrap_or_else(|| address.to_string()),
            script_hash,
        )))
    }
}

#[async_trait]
impl BitcoinBackend for ElectrumBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Electrum
    }

    async fn get_raw_mempool(&self) -> Result<Vec<Txid>, BackendError> {
        self.node.get_raw_mempool().await
    }

    async fn get_raw_transaction(
        &self,
        txid: &str,
        add_prevout: bool,
    ) -> Result<ExtendedTransaction, BackendError> {
        self.node.get_raw_transaction(txid, add_prevout).await
    }

    async fn add_prevouts(
        &self,
        tx: ExtendedTransaction,
    ) -> Result<ExtendedTransaction, BackendError> {
        self.node.add_prevouts(tx).await
    }

    async fn get_block_height_tip(&self) -> Result<u64, BackendError> {
        self.node.get_block_height_tip().await
    }

    async fn get_block_hash(&self, height: u64) -> Result<String, BackendError> {
        self.node.get_block_hash(height).await
    }

    async fn get_block(&self, hash: &str) -> Result<Block, BackendError> {
        self.node.get_block(hash).await
    }

    async fn get_tx_ids_for_block(&self, hash: &str) -> Result<Vec<Txid>, BackendError> {
        self.node.get_tx_ids_for_block(hash).await
    }

    async fn get_mempool_info(&self) -> Result<MempoolInfo, BackendError> {
        self.node.get_mempool_info().await
    }

    async fn get_address(&self, address: &str) -> Result<AddressSummary, BackendError> {
        let (address, script_hash) = match self.address_script_hash(address).await? {
            Some(found) => found,
            None => return Ok(AddressSummary::empty(address)),
        };

        let balance: ScriptHashBalance = self
            .client
            .request("blockchain.scripthash.get_balance", json!([script_hash]))
            .await?;
        let history = self.script_hash_history(&script_hash).await?;
        let unconfirmed = history.iter().filter(|entry| entry.is_unconfirmed()).count() as u64;
        let confirmed = history.len() as u64 - unconfirmed;

        Ok(AddressSummary {
            address,
            chain_stats: stats_from_balance(balance.confirmed, confirmed),
            mempool_stats: stats_from_balance(balance.unconfirmed, unconfirmed),
        })
    }

    async fn get_address_transactions(
        &self,
        address: &str,
        last_seen_txid: Option<&str>,
    ) -> Result<Vec<ExtendedTransaction>, BackendError> {
        let script_hash = match self.address_script_hash(address).await? {
            Some((_, script_hash)) => script_hash,
            None => return Ok(Vec::new()),
        };

        let mut history = self.script_hash_history(&script_hash).await?;
        let page = history_page(&mut history, last_seen_txid);

        let mut transactions = Vec::with_capacity(page.len());
        for entry in page {
            transactions.push(self.node.get_raw_transaction(&entry.tx_hash, true).await?);
        }
        Ok(transactions)
    }
}
