//! # Client Subscription
//!
//! Per-connection topic flags and tracked ids, mutated by inbound control
//! frames. One control frame may carry several instructions:
//!
//! ```json
//! {"action": "want", "data": ["blocks", "stats", "mempool-blocks"]}
//! {"action": "init"}
//! {"action": "ping"}
//! {"track-tx": "<txid>", "watch-mempool": true}
//! {"track-address": "<address>"}
//! {"track-asset": "<asset id>"}
//! {"track-donation": "<22 chars>"}
//! ```
//!
//! A tracked field that fails its format check (`null`, `"stop"`, garbage)
//! is cleared instead of rejecting the frame.

use serde_json::Value;
use shared_types::Txid;

use super::validation::{
    is_valid_address, is_valid_asset_id, is_valid_donation_id, is_valid_txid,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientSubscription {
    pub want_blocks: bool,
    pub want_mempool_blocks: bool,
    pub want_stats: bool,
    pub want_live_chart: bool,
    /// Transaction whose confirmation or replacement is reported.
    pub track_tx: Option<Txid>,
    /// Transaction reported once as soon as it enters the mempool.
    pub track_mempool_tx: Option<Txid>,
    pub track_address: Option<String>,
    pub track_asset: Option<String>,
    pub track_donation: Option<String>,
}

/// What a control frame asks the hub to reply with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlOutcome {
    pub init: bool,
    pub pong: bool,
    /// Tracked tx to look up in the mempool right away.
    pub watch_mempool: Option<Txid>,
}

impl ClientSubscription {
    /// Apply one parsed control frame.
    pub fn apply(&mut self, frame: &Value) -> ControlOutcome {
        let mut outcome = ControlOutcome::default();

        match frame.get("action").and_then(Value::as_str) {
            Some("want") => self.set_wants(frame.get("data")),
            Some("init") => outcome.init = true,
            Some("ping") => outcome.pong = true,
            _ => {}
        }

        if let Some(value) = frame.get("track-tx") {
            self.track_tx = validated(value, is_valid_txid);
            match &self.track_tx {
                Some(txid) if frame.get("watch-mempool").and_then(Value::as_bool) == Some(true) => {
                    outcome.watch_mempool = Some(txid.clone());
                }
                Some(_) => {}
                None => self.track_mempool_tx = None,
            }
        }
        if let Some(value) = frame.get("track-address") {
            self.track_address = validated(value, is_valid_address);
        }
        if let Some(value) = frame.get("track-asset") {
            self.track_asset = validated(value, is_valid_asset_id);
        }
        if let Some(value) = frame.get("track-donation") {
            self.track_donation = validated(value, is_valid_donation_id);
        }

        outcome
    }

    fn set_wants(&mut self, data: Option<&Value>) {
        let wants: Vec<&str> = data
            .and_then(Value::as_array)
            .map(|topics| topics.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        self.want_blocks = wants.contains(&"blocks");
        self.want_mempool_blocks = wants.contains(&"mempool-blocks");
        self.want_stats = wants.contains(&"stats");
        self.want_live_chart = wants.contains(&"live-2h-chart");
    }

    /// Whether address or asset tracking is active.
    pub fn tracks_outputs(&self) -> bool {
        self.track_address.is_some() || self.track_asset.is_some()
    }
}

fn validated(value: &Value, is_valid: fn(&str) -> bool) -> Option<String> {
    value
        .as_str()
        .filter(|candidate| is_valid(candidate))
        .map(str::to_string)
}
