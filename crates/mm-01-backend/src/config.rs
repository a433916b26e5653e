//! Backend connection settings.

use crate::ports::BackendKind;

/// Bitcoin Core JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct CoreRpcConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for CoreRpcConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8332,
            username: "mempool".to_string(),
            password: "mempool".to_string(),
            timeout_secs: 60,
        }
    }
}

impl CoreRpcConfig {
    pub fn url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }
}

/// Electrum server endpoint (plain TCP).
#[derive(Debug, Clone)]
pub struct ElectrumConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ElectrumConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 50001,
        }
    }
}

/// Complete backend configuration.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub core_rpc: CoreRpcConfig,
    /// Base URL of the Esplora REST API, without a trailing slash.
    pub esplora_url: String,
    pub electrum: ElectrumConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Bitcoind,
            core_rpc: CoreRpcConfig::default(),
            esplora_url: "http://127.0.0.1:3000".to_string(),
            electrum: ElectrumConfig::default(),
        }
    }
}
