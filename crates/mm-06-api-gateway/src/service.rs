//! Gateway service: HTTP router and server lifecycle.

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use mm_01_backend::BitcoinBackend;
use mm_02_mempool::SharedMempool;
use mm_03_chain::SharedChain;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::hub::BroadcastHub;
use crate::rest::{api_routes, AppState};

pub struct GatewayService {
    state: AppState,
}

impl GatewayService {
    pub fn new(
        hub: Arc<BroadcastHub>,
        backend: Arc<dyn BitcoinBackend>,
        mempool: SharedMempool,
        chain: SharedChain,
    ) -> Self {
        Self {
            state: AppState {
                hub,
                backend,
                mempool,
                chain,
            },
        }
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.state.hub
    }

    /// Build the full router: API routes under the prefix plus `/metrics`
    /// and `/health`.
    pub fn router(&self) -> Router {
        let prefix = self.state.hub.config().api_prefix.trim_end_matches('/').to_string();
        let middleware = ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(create_cors_layer());

        let router = if prefix.is_empty() {
            Router::new().merge(api_routes())
        } else {
            Router::new().nest(&prefix, api_routes())
        };
        router
            .route("/metrics", get(metrics))
            .route("/health", get(health_check))
            .layer(middleware)
            .with_state(self.state.clone())
    }

    /// Serve until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();
        info!(
            addr = %listener.local_addr()?,
            ws_path = %self.state.hub.config().ws_path(),
            "Starting HTTP server"
        );
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

/// Any origin, any header; the API is read-only.
fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn metrics() -> impl IntoResponse {
    match mm_telemetry::encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "mempool-mirror",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::hub::tests::{fixture, fixture_with, Fixture};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use mm_01_backend::{fake_hash, mempool_transaction, BackendKind, InMemoryBackend};
    use mm_03_chain::extend_block;
    use serde_json::Value;
    use shared_types::MempoolInfo;
    use tower::ServiceExt;

    fn service(f: &Fixture) -> GatewayService {
        GatewayService::new(
            f.hub.clone(),
            f.backend.clone(),
            f.mempool.clone(),
            f.chain.clone(),
        )
    }

    async fn get_raw(f: &Fixture, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = service(f)
            .router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn get_json(f: &Fixture, uri: &str) -> (StatusCode, Value) {
        let (status, body) = get_raw(f, uri).await;
        let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, value)
    }

    /// Mine `count` blocks upstream and mirror them into the chain store.
    async fn mirror_chain(f: &Fixture, count: u64) {
        for _ in 0..count {
            let block = f.backend.mine_block(&[]);
            let coinbase = f
                .backend
                .get_raw_transaction(&fake_hash(0xc0, block.height), false)
                .await
                .unwrap();
            let (extended, _) = extend_block(block, vec![coinbase]);
            f.chain.write().push(extended);
        }
    }

    #[tokio::test]
    async fn test_health() {
        let f = fixture();
        let (status, body) = get_json(&f, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_recommended_fees_require_sync() {
        let f = fixture();
        let (status, _) = get_raw(&f, "/api/v1/fees/recommended").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let txid = fake_hash(0xaa, 1);
        f.mempool.write().set_mempool_info(MempoolInfo {
            mempoolminfee: 0.00001,
            ..Default::default()
        });
        let fetched = vec![mempool_transaction(&txid, 4_000, 800)];
        f.mempool
            .write()
            .apply_refresh(&[txid], fetched, 1_700_000_000_000);
        f.hub.recompute_projection();

        let (status, body) = get_json(&f, "/api/v1/fees/recommended").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["minimumFee"], 1);
        assert_eq!(body["fastestFee"], 1);
    }

    #[tokio::test]
    async fn test_mempool_endpoints() {
        let f = fixture();
        let older = {
            let mut tx = mempool_transaction(&fake_hash(0xaa, 1), 1_000, 800);
            tx.first_seen = Some(100);
            tx
        };
        let newer = {
            let mut tx = mempool_transaction(&fake_hash(0xaa, 2), 2_000, 800);
            tx.first_seen = Some(200);
            tx
        };
        f.mempool.write().replace_all([older.clone(), newer.clone()]);
        f.hub.recompute_projection();

        let (_, summary) = get_json(&f, "/api/v1/mempool").await;
        assert_eq!(summary["total_fee"], 3_000);
        assert_eq!(summary["fee_histogram"], serde_json::json!([]));

        let (_, recent) = get_json(&f, "/api/v1/mempool/recent").await;
        assert_eq!(recent[0]["txid"], newer.txid.as_str());
        assert_eq!(recent[1]["txid"], older.txid.as_str());

        let (_, blocks) = get_json(&f, "/api/v1/fees/mempool-blocks").await;
        assert_eq!(blocks[0]["nTx"], 2);

        let uri = format!(
            "/api/v1/transaction-times?txId%5B%5D={}&txId%5B%5D={}&txId%5B%5D={}",
            newer.txid,
            older.txid,
            fake_hash(0xaa, 3)
        );
        let (status, times) = get_json(&f, &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(times, serde_json::json!([200, 100, 0]));

        let (status, _) = get_raw(&f, "/api/v1/transaction-times").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_transaction_lookup() {
        let f = fixture();
        let pending = mempool_transaction(&fake_hash(0xaa, 1), 1_000, 800);
        f.mempool.write().replace_all([pending.clone()]);
        let upstream = mempool_transaction(&fake_hash(0xaa, 2), 1_000, 800);
        f.backend.add_mempool_transaction(upstream.clone());

        let (status, tx) = get_json(&f, &format!("/api/v1/tx/{}", pending.txid)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tx["txid"], pending.txid.as_str());

        let (status, tx_status) =
            get_json(&f, &format!("/api/v1/tx/{}/status", upstream.txid)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tx_status["confirmed"], false);

        let (status, _) = get_raw(&f, &format!("/api/v1/tx/{}", fake_hash(0xdd, 9))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = get_raw(&f, "/api/v1/tx/not-a-txid").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_address_lookups_by_backend_kind() {
        let address = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";

        let f = fixture();
        let (status, summary) = get_json(&f, &format!("/api/v1/address/{address}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["address"], address);
        let (status, _) = get_raw(&f, &format!("/api/v1/address/{address}/txs")).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = get_raw(&f, "/api/v1/address/not!valid").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let core = fixture_with(
            InMemoryBackend::with_kind(BackendKind::Bitcoind),
            GatewayConfig::default(),
        );
        let (status, _) = get_raw(&core, &format!("/api/v1/address/{address}")).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        let uri = format!("/api/v1/address/{address}/txs/chain/{}", fake_hash(0xaa, 1));
        let (status, _) = get_raw(&core, &uri).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_block_endpoints() {
        let f = fixture();
        let (status, _) = get_raw(&f, "/api/v1/blocks/tip/height").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        mirror_chain(&f, 12).await;

        let (status, body) = get_raw(&f, "/api/v1/blocks/tip/height").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"11");

        let (_, blocks) = get_json(&f, "/api/v1/blocks").await;
        let blocks = blocks.as_array().unwrap();
        assert_eq!(blocks.len(), 10);
        assert_eq!(blocks[0]["height"], 11);
        assert_eq!(blocks[9]["height"], 2);
        assert!(blocks[0].get("reward").is_some());

        let (_, blocks) = get_json(&f, "/api/v1/blocks/3").await;
        let heights: Vec<_> = blocks
            .as_array()
            .unwrap()
            .iter()
            .map(|block| block["height"].as_u64().unwrap())
            .collect();
        assert_eq!(heights, vec![3, 2, 1, 0]);

        let (status, body) = get_raw(&f, "/api/v1/block-height/5").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(String::from_utf8(body).unwrap(), fake_hash(0xb1, 5));

        let (_, block) = get_json(&f, &format!("/api/v1/block/{}", fake_hash(0xb1, 4))).await;
        assert_eq!(block["height"], 4);
        let (_, txids) =
            get_json(&f, &format!("/api/v1/block/{}/txids", fake_hash(0xb1, 4))).await;
        assert_eq!(txids, serde_json::json!([fake_hash(0xc0, 4)]));

        let (status, _) = get_raw(&f, &format!("/api/v1/block/{}", fake_hash(0xb1, 99))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let f = fixture();
        let response = service(&f)
            .router()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "https://example.org")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }
}
