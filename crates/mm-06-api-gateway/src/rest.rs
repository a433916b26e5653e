//! # REST Delegations
//!
//! Thin read-only endpoints over the mirror state and the backend. Local
//! state is preferred; the backend is asked only for what the mirror does
//! not hold.
//!
//! | Route | Source |
//! |-------|--------|
//! | `fees/recommended`, `fees/mempool-blocks` | projection |
//! | `mempool`, `mempool/recent`, `transaction-times` | mempool store |
//! | `mempool/txids` | backend |
//! | `tx/:id`, `tx/:id/status` | mempool store, then backend |
//! | `address/*` | backend (405 on `bitcoind`) |
//! | `block/:hash`, `blocks`, `blocks/:height` | chain store, then backend |
//! | `block/:hash/txids`, `block-height/:height` | backend |

use axum::extract::{Path, RawQuery, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use mm_01_backend::{BackendKind, BitcoinBackend};
use mm_02_mempool::SharedMempool;
use mm_03_chain::SharedChain;
use mm_04_projection::{recommended_fees, ProjectedBlock, RecommendedFees};
use serde::Serialize;
use serde_json::Value;
use shared_types::{AddressSummary, ExtendedTransaction, TransactionStripped, TxStatus, Txid};
use std::sync::Arc;

use crate::domain::validation::{is_valid_address, is_valid_txid};
use crate::domain::ApiError;
use crate::hub::BroadcastHub;
use crate::ws::handle_socket;

/// Blocks returned per `blocks` page.
const BLOCKS_PAGE: usize = 10;
/// Transactions returned by `mempool/recent`.
const RECENT_MEMPOOL: usize = 10;

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<BroadcastHub>,
    pub backend: Arc<dyn BitcoinBackend>,
    pub mempool: SharedMempool,
    pub chain: SharedChain,
}

/// `mempool` summary.
#[derive(Debug, Serialize)]
pub struct MempoolSummary {
    pub count: u64,
    pub vsize: u64,
    pub total_fee: u64,
    pub fee_histogram: Vec<Value>,
}

/// Routes mounted under the API prefix, WebSocket endpoint included.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/fees/recommended", get(get_recommended_fees))
        .route("/fees/mempool-blocks", get(get_mempool_blocks))
        .route("/mempool", get(get_mempool))
        .route("/mempool/txids", get(get_mempool_txids))
        .route("/mempool/recent", get(get_recent_mempool))
        .route("/transaction-times", get(get_transaction_times))
        .route("/tx/:id", get(get_transaction))
        .route("/tx/:id/status", get(get_transaction_status))
        .route("/address/:address", get(get_address))
        .route("/address/:address/txs", get(get_address_transactions))
        .route(
            "/address/:address/txs/chain/:last_seen",
            get(get_address_transactions_after),
        )
        .route("/block/:hash", get(get_block))
        .route("/block/:hash/txids", get(get_block_txids))
        .route("/blocks", get(get_blocks_from_tip))
        .route("/blocks/tip/height", get(get_tip_height))
        .route("/blocks/:height", get(get_blocks))
        .route("/block-height/:height", get(get_block_hash_at))
}

async fn ws_upgrade(
    State(state): State<AppState>,
    ws: axum::extract::WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state.hub, socket))
}

async fn get_recommended_fees(
    State(state): State<AppState>,
) -> Result<Json<RecommendedFees>, ApiError> {
    let info = {
        let store = state.mempool.read();
        if !store.is_in_sync() {
            return Err(ApiError::unavailable());
        }
        store.mempool_info().clone()
    };
    Ok(Json(recommended_fees(&state.hub.projection(), &info)))
}

async fn get_mempool_blocks(State(state): State<AppState>) -> Json<Vec<ProjectedBlock>> {
    Json(state.hub.projection().as_ref().clone())
}

async fn get_mempool(State(state): State<AppState>) -> Json<MempoolSummary> {
    let store = state.mempool.read();
    let info = store.mempool_info();
    Json(MempoolSummary {
        count: info.size,
        vsize: info.bytes,
        total_fee: store.transactions().iter().map(|tx| tx.fee).sum(),
        fee_histogram: Vec::new(),
    })
}

async fn get_mempool_txids(State(state): State<AppState>) -> Result<Json<Vec<Txid>>, ApiError> {
    Ok(Json(state.backend.get_raw_mempool().await?))
}

async fn get_recent_mempool(State(state): State<AppState>) -> Json<Vec<TransactionStripped>> {
    let store = state.mempool.read();
    let mut transactions = store.transactions();
    transactions.sort_by_key(|tx| std::cmp::Reverse(tx.first_seen.unwrap_or_default()));
    Json(
        transactions
            .into_iter()
            .take(RECENT_MEMPOOL)
            .map(ExtendedTransaction::stripped)
            .collect(),
    )
}

/// `transaction-times?txId[]=a&txId[]=b`
async fn get_transaction_times(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<Vec<u64>>, ApiError> {
    let txids = parse_txid_list(query.as_deref().unwrap_or_default());
    if txids.is_empty() {
        return Err(ApiError::bad_request("Not an array"));
    }
    Ok(Json(state.mempool.read().first_seen_for(&txids)))
}

fn parse_txid_list(query: &str) -> Vec<Txid> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .filter(|(key, _)| matches!(*key, "txId[]" | "txId%5B%5D" | "txId"))
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

async fn lookup_transaction(
    state: &AppState,
    txid: &str,
) -> Result<ExtendedTransaction, ApiError> {
    if !is_valid_txid(txid) {
        return Err(ApiError::bad_request("Invalid transaction ID"));
    }
    let pending = state.mempool.read().get(txid).cloned();
    let tx = match pending {
        Some(tx) if state.backend.kind() == BackendKind::Esplora => tx,
        Some(tx) => state.backend.add_prevouts(tx).await?,
        None => state.backend.get_raw_transaction(txid, true).await?,
    };
    Ok(tx)
}

async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ExtendedTransaction>, ApiError> {
    Ok(Json(lookup_transaction(&state, &id).await?))
}

async fn get_transaction_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TxStatus>, ApiError> {
    Ok(Json(lookup_transaction(&state, &id).await?.status))
}

fn check_address(state: &AppState, address: &str) -> Result<(), ApiError> {
    // Let the backend report the unsupported operation before validating
    if state.backend.kind() != BackendKind::Bitcoind && !is_valid_address(address) {
        return Err(ApiError::bad_request("Invalid address"));
    }
    Ok(())
}

async fn get_address(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<AddressSummary>, ApiError> {
    check_address(&state, &address)?;
    Ok(Json(state.backend.get_address(&address).await?))
}

async fn get_address_transactions(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<Vec<ExtendedTransaction>>, ApiError> {
    check_address(&state, &address)?;
    Ok(Json(
        state
            .backend
            .get_address_transactions(&address, None)
            .await?,
    ))
}

async fn get_address_transactions_after(
    State(state): State<AppState>,
    Path((address, last_seen)): Path<(String, String)>,
) -> Result<Json<Vec<ExtendedTransaction>>, ApiError> {
    check_address(&state, &address)?;
    Ok(Json(
        state
            .backend
            .get_address_transactions(&address, Some(&last_seen))
            .await?,
    ))
}

/// A stored block when the mirror has it, otherwise the backend header.
async fn block_by_hash(state: &AppState, hash: &str) -> Result<Value, ApiError> {
    let local = state.chain.read().get_by_hash(hash).map(|block| block.summary());
    let block = match local {
        Some(block) => serde_json::to_value(block)?,
        None => serde_json::to_value(state.backend.get_block(hash).await?)?,
    };
    Ok(block)
}

async fn get_block(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(block_by_hash(&state, &hash).await?))
}

async fn get_block_txids(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<Vec<Txid>>, ApiError> {
    Ok(Json(state.backend.get_tx_ids_for_block(&hash).await?))
}

async fn get_tip_height(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let height = state
        .chain
        .read()
        .tip_height()
        .ok_or_else(ApiError::unavailable)?;
    Ok(([(header::CONTENT_TYPE, "text/plain")], height.to_string()))
}

async fn get_blocks_from_tip(State(state): State<AppState>) -> Result<Json<Vec<Value>>, ApiError> {
    walk_blocks(&state, None).await.map(Json)
}

async fn get_blocks(
    State(state): State<AppState>,
    Path(height): Path<u64>,
) -> Result<Json<Vec<Value>>, ApiError> {
    walk_blocks(&state, Some(height)).await.map(Json)
}

/// Up to a page of blocks walking back from `from` (clamped to the tip)
/// along `previousblockhash`.
async fn walk_blocks(state: &AppState, from: Option<u64>) -> Result<Vec<Value>, ApiError> {
    let (start, local_hash) = {
        let chain = state.chain.read();
        let tip = chain.tip_height().ok_or_else(ApiError::unavailable)?;
        let start = from.map_or(tip, |height| height.min(tip));
        let hash = chain.get_by_height(start).map(|block| block.hash().to_string());
        (start, hash)
    };
    let mut next = match local_hash {
        Some(hash) => Some(hash),
        None => Some(state.backend.get_block_hash(start).await?),
    };

    let mut blocks = Vec::with_capacity(BLOCKS_PAGE);
    while blocks.len() < BLOCKS_PAGE {
        let Some(hash) = next.take() else {
            break;
        };
        let block = block_by_hash(state, &hash).await?;
        next = block
            .get("previousblockhash")
            .and_then(Value::as_str)
            .map(str::to_string);
        blocks.push(block);
    }
    Ok(blocks)
}

async fn get_block_hash_at(
    State(state): State<AppState>,
    Path(height): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let hash = state.backend.get_block_hash(height).await?;
    Ok(([(header::CONTENT_TYPE, "text/plain")], hash))
}
