//! Esplora REST backend.
//!
//! The indexer already speaks the canonical shape; this adapter is a typed
//! pass-through that only recomputes derived fields.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use shared_types::{AddressSummary, Block, ExtendedTransaction, MempoolInfo, Txid};
use std::time::Duration;

use crate::domain::BackendError;
use crate::ports::{BackendKind, BitcoinBackend};

/// `GET /mempool` summary.
#[derive(Debug, Deserialize)]
struct EsploraMempool {
    count: u64,
    vsize: u64,
}

/// Esplora-compatible REST backend.
pub struct EsploraBackend {
    http_client: reqwest::Client,
    base_url: String,
}

impl EsploraBackend {
    pub fn new(base_url: &str) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, BackendError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http_client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(path.to_string()));
        }
        Ok(response.error_for_status()?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        Ok(self.get(path).await?.json().await?)
    }

    async fn get_text(&self, path: &str) -> Result<String, BackendError> {
        Ok(self.get(path).await?.text().await?)
    }
}

#[async_trait]
impl BitcoinBackend for EsploraBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Esplora
    }

    async fn get_raw_mempool(&self) -> Result<Vec<Txid>, BackendError> {
        self.get_json("/mempool/txids").await
    }

    async fn get_raw_transaction(
        &self,
        txid: &str,
        _add_prevout: bool,
    ) -> Result<ExtendedTransaction, BackendError> {
        // Prevouts are always included by the indexer.
        let tx: ExtendedTransaction = self.get_json(&format!("/tx/{txid}")).await?;
        Ok(tx.extend())
    }

    async fn add_prevouts(
        &self,
        tx: ExtendedTransaction,
    ) -> Result<ExtendedTransaction, BackendError> {
        Ok(tx)
    }

    async fn get_block_height_tip(&self) -> Result<u64, BackendError> {
        let text = self.get_text("/blocks/tip/height").await?;
        text.trim()
            .parse()
            .map_err(|_| BackendError::InvalidResponse(format!("tip height: {text}")))
    }

    async fn get_block_hash(&self, height: u64) -> Result<String, BackendError> {
        let text = self.get_text(&format!("/block-height/{height}")).await?;
        Ok(text.trim().to_string())
    }

    async fn get_block(&self, hash: &str) -> Result<Block, BackendError> {
        self.get_json(&format!("/block/{hash}")).await
    }

    async fn get_tx_ids_for_block(&self, hash: &str) -> Result<Vec<Txid>, BackendError> {
        self.get_json(&format!("/block/{hash}/txids")).await
    }

    async fn get_mempool_info(&self) -> Result<MempoolInfo, BackendError> {
        let mempool: EsploraMempool = self.get_json("/mempool").await?;
        Ok(MempoolInfo {
            loaded: true,
            size: mempool.count,
            bytes: mempool.vsize,
            ..Default::default()
        })
    }

    async fn get_address(&self, address: &str) -> Result<AddressSummary, BackendError> {
        self.get_json(&format!("/address/{address}")).await
    }

    async fn get_address_transactions(
        &self,
        address: &str,
        last_seen_txid: Option<&str>,
    ) -> Result<Vec<ExtendedTransaction>, BackendError> {
        let path = match last_seen_txid {
            Some(last_seen) => format!("/address/{address}/txs/chain/{last_seen}"),
            None => format!("/address/{address}/txs"),
        };
        let txs: Vec<ExtendedTransaction> = self.get_json(&path).await?;
        Ok(txs.into_iter().map(ExtendedTransaction::extend).collect())
    }
}
