//! Gateway configuration.

use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub http_port: u16,
    /// Prefix the REST routes are mounted under.
    pub api_prefix: String,
    /// Frames buffered per connection before new ones are dropped.
    pub outbound_queue: usize,
    /// Blocks sent in the `init` reply.
    pub initial_blocks: usize,
    /// Stripped new transactions included in `stats` updates.
    pub recent_transactions: usize,
    pub git_commit: String,
    pub hostname: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            http_port: 8999,
            api_prefix: "/api/v1".to_string(),
            outbound_queue: 256,
            initial_blocks: 8,
            recent_transactions: 6,
            git_commit: "?".to_string(),
            hostname: String::new(),
        }
    }
}

impl GatewayConfig {
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.http_port))
    }

    pub fn ws_path(&self) -> String {
        format!("{}/ws", self.api_prefix.trim_end_matches('/'))
    }
}
