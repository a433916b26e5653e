//! # Node Configuration
//!
//! Aggregates every component's configuration. Values come from `MM_*`
//! environment variables; anything missing or unparsable keeps the
//! reference default.

use mm_01_backend::{BackendConfig, BackendKind};
use mm_02_mempool::MempoolConfig;
use mm_03_chain::ChainConfig;
use mm_04_projection::ProjectionConfig;
use mm_05_persistence::PersistenceConfig;
use mm_06_api_gateway::GatewayConfig;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Sync loop cadence.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Delay between successful cycles.
    pub poll_interval: Duration,
    /// First retry delay after a failed cycle.
    pub retry_floor: Duration,
    /// Upper bound for the doubling retry delay.
    pub retry_cap: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2_000),
            retry_floor: Duration::from_secs(5),
            retry_cap: Duration::from_secs(60),
        }
    }
}

/// Complete node configuration.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    pub backend: BackendConfig,
    pub mempool: MempoolConfig,
    pub chain: ChainConfig,
    pub projection: ProjectionConfig,
    pub persistence: PersistenceConfig,
    pub gateway: GatewayConfig,
    pub sync: SyncConfig,
}

impl NodeConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns the raw value of
    /// a variable if it is set.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let mut config = Self::default();

        // Backend
        let backend = &mut config.backend;
        env.parse("MM_BACKEND", &mut backend.kind);
        env.string("MM_CORE_RPC_HOST", &mut backend.core_rpc.host);
        env.parse("MM_CORE_RPC_PORT", &mut backend.core_rpc.port);
        env.string("MM_CORE_RPC_USERNAME", &mut backend.core_rpc.username);
        env.string("MM_CORE_RPC_PASSWORD", &mut backend.core_rpc.password);
        env.parse("MM_CORE_RPC_TIMEOUT_SECS", &mut backend.core_rpc.timeout_secs);
        env.string("MM_ESPLORA_URL", &mut backend.esplora_url);
        env.string("MM_ELECTRUM_HOST", &mut backend.electrum.host);
        env.parse("MM_ELECTRUM_PORT", &mut backend.electrum.port);
        backend.esplora_url = backend.esplora_url.trim_end_matches('/').to_string();

        // Sync cadence and mempool
        env.millis("MM_POLL_INTERVAL_MS", &mut config.sync.poll_interval);
        env.millis("MM_MEMPOOL_FETCH_BUDGET_MS", &mut config.mempool.fetch_budget);
        env.secs(
            "MM_TX_PER_SECOND_SAMPLE_PERIOD",
            &mut config.mempool.throughput_sample_period,
        );
        let protection = &mut config.mempool.clear_protection;
        env.parse("MM_CLEAR_PROTECTION_MIN_SIZE", &mut protection.min_size);
        env.parse("MM_CLEAR_PROTECTION_RATIO", &mut protection.ratio);
        let mut minutes = protection.cooldown.as_secs() / 60;
        env.parse("MM_CLEAR_PROTECTION_MINUTES", &mut minutes);
        protection.cooldown = Duration::from_secs(minutes * 60);

        // Chain and projection
        env.parse(
            "MM_INITIAL_BLOCK_AMOUNT",
            &mut config.chain.initial_block_amount,
        );
        env.parse(
            "MM_MEMPOOL_BLOCKS_AMOUNT",
            &mut config.projection.mempool_blocks_amount,
        );

        // Persistence
        let mut cache_dir = config.persistence.cache_dir.display().to_string();
        env.string("MM_CACHE_DIR", &mut cache_dir);
        config.persistence.cache_dir = PathBuf::from(cache_dir);

        // Gateway
        let gateway = &mut config.gateway;
        env.parse("MM_HTTP_PORT", &mut gateway.http_port);
        env.string("MM_API_PREFIX", &mut gateway.api_prefix);
        env.string("MM_GIT_COMMIT", &mut gateway.git_commit);
        env.string("HOSTNAME", &mut gateway.hostname);
        gateway.initial_blocks = config.chain.initial_block_amount as usize;

        config
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn string(&self, name: &str, target: &mut String) {
        if let Some(value) = self.raw(name) {
            *target = value;
        }
    }

    fn parse<T>(&self, name: &str, target: &mut T)
    where
        T: FromStr + std::fmt::Debug,
        T::Err: std::fmt::Display,
    {
        let Some(value) = self.raw(name) else {
            return;
        };
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(e) => warn!(
                variable = name,
                value = %value,
                error = %e,
                default = ?target,
                "Invalid configuration value, keeping default"
            ),
        }
    }

    fn millis(&self, name: &str, target: &mut Duration) {
        let mut millis = target.as_millis() as u64;
        self.parse(name, &mut millis);
        *target = Duration::from_millis(millis);
    }

    fn secs(&self, name: &str, target: &mut Duration) {
        let mut secs = target.as_secs();
        self.parse(name, &mut secs);
        *target = Duration::from_secs(secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> NodeConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        NodeConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]);
        assert_eq!(config.backend.kind, BackendKind::Bitcoind);
        assert_eq!(config.sync.poll_interval, Duration::from_secs(2));
        assert_eq!(config.persistence.cache_dir, PathBuf::from("./cache"));
        assert_eq!(config.mempool.clear_protection.min_size, 20_000);
        assert_eq!(
            config.mempool.clear_protection.cooldown,
            Duration::from_secs(600)
        );
        assert_eq!(config.chain.initial_block_amount, 8);
        assert_eq!(config.gateway.http_port, 8999);
        assert_eq!(config.gateway.api_prefix, "/api/v1");
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("MM_BACKEND", "esplora"),
            ("MM_ESPLORA_URL", "http://esplora:3000/"),
            ("MM_POLL_INTERVAL_MS", "500"),
            ("MM_TX_PER_SECOND_SAMPLE_PERIOD", "60"),
            ("MM_CLEAR_PROTECTION_RATIO", "0.5"),
            ("MM_CLEAR_PROTECTION_MINUTES", "3"),
            ("MM_INITIAL_BLOCK_AMOUNT", "4"),
            ("MM_CACHE_DIR", "/var/cache/mirror"),
            ("MM_HTTP_PORT", "9000"),
            ("MM_GIT_COMMIT", "abc123"),
        ]);
        assert_eq!(config.backend_kind(), BackendKind::Esplora);
        assert_eq!(config.backend.esplora_url, "http://esplora:3000");
        assert_eq!(config.sync.poll_interval, Duration::from_millis(500));
        assert_eq!(
            config.mempool.throughput_sample_period,
            Duration::from_secs(60)
        );
        assert_eq!(config.mempool.clear_protection.ratio, 0.5);
        assert_eq!(
            config.mempool.clear_protection.cooldown,
            Duration::from_secs(180)
        );
        assert_eq!(config.chain.initial_block_amount, 4);
        assert_eq!(config.gateway.initial_blocks, 4);
        assert_eq!(
            config.persistence.cache_dir,
            PathBuf::from("/var/cache/mirror")
        );
        assert_eq!(config.gateway.http_port, 9000);
        assert_eq!(config.gateway.git_commit, "abc123");
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = load(&[
            ("MM_BACKEND", "lnd"),
            ("MM_HTTP_PORT", "not-a-port"),
            ("MM_POLL_INTERVAL_MS", "-1"),
            ("MM_CORE_RPC_HOST", "   "),
        ]);
        assert_eq!(config.backend.kind, BackendKind::Bitcoind);
        assert_eq!(config.gateway.http_port, 8999);
        assert_eq!(config.sync.poll_interval, Duration::from_secs(2));
        assert_eq!(config.backend.core_rpc.host, "127.0.0.1");
    }
}
