//! JSON-RPC client for Bitcoin Core.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::CoreRpcConfig;
use crate::domain::BackendError;

/// RPC_INVALID_ADDRESS_OR_KEY: unknown transaction or block.
const RPC_INVALID_ADDRESS_OR_KEY: i64 = -5;
/// RPC_INVALID_PARAMETER: e.g. block height out of range.
const RPC_INVALID_PARAMETER: i64 = -8;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: serde_json::Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl From<JsonRpcError> for BackendError {
    fn from(error: JsonRpcError) -> Self {
        match error.code {
            RPC_INVALID_ADDRESS_OR_KEY | RPC_INVALID_PARAMETER => {
                BackendError::NotFound(error.message)
            }
            code => BackendError::Transient(format!("RPC error {code}: {}", error.message)),
        }
    }
}

/// Authenticated HTTP JSON-RPC client.
pub struct CoreRpcClient {
    http_client: reqwest::Client,
    rpc_url: String,
    username: String,
    password: String,
    request_id: AtomicU64,
}

impl CoreRpcClient {
    pub fn new(config: &CoreRpcConfig) -> Self {
        // reqwest::Client::new() is infallible, use it if the builder fails
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http_client,
            rpc_url: config.url(),
            username: config.username.clone(),
            password: config.password.clone(),
            request_id: AtomicU64::new(1),
        }
    }

    /// Make a JSON-RPC call.
    ///
    /// The node answers errors with a non-2xx status and a JSON body, so the
    /// body is decoded regardless of status.
    pub async fn call<R: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<R, BackendError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);

        let request = JsonRpcRequest {
            jsonrpc: "1.0",
            method,
            params,
            id,
        };

        let response = self
            .http_client
            .post(&self.rpc_url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&request)
            .send()
            .await
            .map_err(|e| BackendError::Transient(format!("{method}: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(BackendError::Transient(format!(
                "{method}: RPC authentication failed ({status})"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Transient(format!("{method}: {e}")))?;
        let rpc_response: JsonRpcResponse<R> = serde_json::from_str(&body)
            .map_err(|e| BackendError::InvalidResponse(format!("{method}: {e}")))?;

        if let Some(error) = rpc_response.error {
            return Err(error.into());
        }

        rpc_response
            .result
            .ok_or_else(|| BackendError::InvalidResponse(format!("{method}: missing result")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_transaction_maps_to_not_found() {
        let error = JsonRpcError {
            code: -5,
            message: "No such mempool or blockchain transaction".to_string(),
        };
        let mapped: BackendError = error.into();
        assert!(mapped.is_not_found());
        assert!(mapped
            .to_string()
            .contains("No such mempool or blockchain transaction"));
    }

    #[test]
    fn test_other_rpc_errors_are_transient() {
        let error = JsonRpcError {
            code: -28,
            message: "Loading block index...".to_string(),
        };
        assert!(BackendError::from(error).is_transient());
    }

    #[test]
    fn test_error_response_decodes() {
        let body = r#"{"result":null,"error":{"code":-5,"message":"Block not found"},"id":1}"#;
        let response: JsonRpcResponse<String> = serde_json::from_str(body).unwrap();
        assert!(response.result.is_none());
        assert_eq!(response.error.map(|e| e.code), Some(-5));
    }
}
