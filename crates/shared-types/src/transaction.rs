//! # Transaction Records
//!
//! Indexer-style transaction shape that every backend normalizes into.
//!
//! ```text
//! upstream RPC / REST ──normalize──→ ExtendedTransaction ──strip──→ TransactionStripped
//!                                            │
//!                                            └── coinbase ──→ CoinbaseStripped
//! ```

use serde::{Deserialize, Serialize};

/// Transaction id as lowercase hex.
pub type Txid = String;

/// Sequence numbers below this value opt in to replacement.
pub const RBF_SEQUENCE_THRESHOLD: u32 = 0xffff_fffe;

fn final_sequence() -> u32 {
    u32::MAX
}

/// Confirmation status of a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxStatus {
    pub confirmed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_time: Option<u64>,
}

impl TxStatus {
    /// Status of a transaction still waiting in the mempool.
    pub fn unconfirmed() -> Self {
        Self::default()
    }

    /// Status of a transaction included in the given block.
    pub fn confirmed_in(block_height: u64, block_hash: impl Into<String>, block_time: u64) -> Self {
        Self {
            confirmed: true,
            block_height: Some(block_height),
            block_hash: Some(block_hash.into()),
            block_time: Some(block_time),
        }
    }
}

/// Transaction output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vout {
    #[serde(default)]
    pub scriptpubkey: String,
    #[serde(default)]
    pub scriptpubkey_asm: String,
    #[serde(default)]
    pub scriptpubkey_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scriptpubkey_address: Option<String>,
    /// Value in satoshis. Confidential outputs carry no value.
    #[serde(default)]
    pub value: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pegout: Option<serde_json::Value>,
}

/// Asset issuance attached to an input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issuance {
    pub asset_id: String,
}

/// Transaction input, optionally with its resolved previous output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vin {
    #[serde(default)]
    pub txid: Txid,
    #[serde(default)]
    pub vout: u32,
    #[serde(default)]
    pub prevout: Option<Vout>,
    #[serde(default)]
    pub scriptsig: String,
    #[serde(default)]
    pub scriptsig_asm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness: Option<Vec<String>>,
    #[serde(default)]
    pub is_coinbase: bool,
    #[serde(default = "final_sequence")]
    pub sequence: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_redeemscript_asm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_witnessscript_asm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_pegin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuance: Option<Issuance>,
}

impl Default for Vin {
    fn default() -> Self {
        Self {
            txid: String::new(),
            vout: 0,
            prevout: None,
            scriptsig: String::new(),
            scriptsig_asm: String::new(),
            witness: None,
            is_coinbase: false,
            sequence: final_sequence(),
            inner_redeemscript_asm: None,
            inner_witnessscript_asm: None,
            is_pegin: None,
            issuance: None,
        }
    }
}

/// Canonical transaction record held by the mempool and embedded in blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtendedTransaction {
    pub txid: Txid,
    #[serde(default)]
    pub version: i32,
    #[serde(default)]
    pub locktime: u32,
    #[serde(default)]
    pub size: u64,
    pub weight: u64,
    /// Absolute fee in satoshis.
    #[serde(default)]
    pub fee: u64,
    #[serde(default)]
    pub vin: Vec<Vin>,
    #[serde(default)]
    pub vout: Vec<Vout>,
    #[serde(default)]
    pub status: TxStatus,
    /// Derived: `weight / 4`.
    #[serde(default)]
    pub vsize: f64,
    /// Derived: `max(1, fee / vsize)`.
    #[serde(rename = "feePerVsize", default)]
    pub fee_per_vsize: f64,
    /// Unix seconds at which the mirror first normalized this transaction.
    #[serde(rename = "firstSeen", default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<u64>,
}

impl ExtendedTransaction {
    /// Recompute the derived size and feerate fields.
    #[must_use]
    pub fn extend(mut self) -> Self {
        self.refresh_derived();
        self
    }

    /// Recompute `vsize` and `fee_per_vsize` in place.
    pub fn refresh_derived(&mut self) {
        self.vsize = self.weight as f64 / 4.0;
        self.fee_per_vsize = if self.vsize > 0.0 {
            (self.fee as f64 / self.vsize).max(1.0)
        } else {
            1.0
        };
    }

    pub fn feerate(&self) -> f64 {
        self.fee_per_vsize
    }

    pub fn is_coinbase(&self) -> bool {
        self.vin.first().is_some_and(|vin| vin.is_coinbase)
    }

    pub fn total_output_value(&self) -> u64 {
        self.vout.iter().map(|vout| vout.value).sum()
    }

    /// True when at least one input opts in to replace-by-fee.
    pub fn signals_rbf(&self) -> bool {
        self.vin
            .iter()
            .any(|vin| vin.sequence < RBF_SEQUENCE_THRESHOLD)
    }

    /// True when an input's resolved prevout or any output pays to `address`.
    pub fn touches_address(&self, address: &str) -> bool {
        let in_inputs = self.vin.iter().any(|vin| {
            vin.prevout
                .as_ref()
                .and_then(|prevout| prevout.scriptpubkey_address.as_deref())
                == Some(address)
        });
        in_inputs
            || self
                .vout
                .iter()
                .any(|vout| vout.scriptpubkey_address.as_deref() == Some(address))
    }

    pub fn stripped(&self) -> TransactionStripped {
        TransactionStripped {
            txid: self.txid.clone(),
            fee: self.fee,
            weight: self.weight,
            vsize: self.weight as f64 / 4.0,
            value: self.total_output_value(),
        }
    }

    /// Reduce a coinbase to its scriptsig and the outputs that pay something.
    pub fn strip_coinbase(&self) -> CoinbaseStripped {
        CoinbaseStripped {
            vin: self
                .vin
                .first()
                .map(|vin| CoinbaseInput {
                    scriptsig: vin.scriptsig.clone(),
                })
                .into_iter()
                .collect(),
            vout: self
                .vout
                .iter()
                .filter(|vout| vout.value > 0)
                .map(|vout| CoinbaseOutput {
                    scriptpubkey_address: vout.scriptpubkey_address.clone(),
                    value: vout.value,
                })
                .collect(),
        }
    }
}

/// Compact view used for the "latest transactions" ring and push frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionStripped {
    pub txid: Txid,
    pub fee: u64,
    pub weight: u64,
    pub vsize: f64,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinbaseInput {
    pub scriptsig: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinbaseOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scriptpubkey_address: Option<String>,
    pub value: u64,
}

/// Coinbase record stored with each block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinbaseStripped {
    pub vin: Vec<CoinbaseInput>,
    pub vout: Vec<CoinbaseOutput>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(fee: u64, weight: u64) -> ExtendedTransaction {
        ExtendedTransaction {
            txid: "aa".repeat(32),
            fee,
            weight,
            ..Default::default()
        }
        .extend()
    }

    #[test]
    fn test_derived_fields() {
        let tx = tx(1000, 800);
        assert_eq!(tx.vsize, 200.0);
        assert_eq!(tx.fee_per_vsize, 5.0);
    }

    #[test]
    fn test_feerate_floor_is_one() {
        let tx = tx(10, 4000);
        assert_eq!(tx.fee_per_vsize, 1.0);
        let zero = tx_with_zero_weight();
        assert_eq!(zero.fee_per_vsize, 1.0);
    }

    fn tx_with_zero_weight() -> ExtendedTransaction {
        tx(100, 0)
    }

    #[test]
    fn test_signals_rbf() {
        let mut tx = tx(1000, 800);
        tx.vin.push(Vin::default());
        assert!(!tx.signals_rbf());

        tx.vin.push(Vin {
            sequence: 0xffff_fffd,
            ..Default::default()
        });
        assert!(tx.signals_rbf());
    }

    #[test]
    fn test_strip_coinbase_drops_zero_outputs() {
        let mut coinbase = tx(0, 800);
        coinbase.vin.push(Vin {
            is_coinbase: true,
            scriptsig: "03abcdef".to_string(),
            ..Default::default()
        });
        coinbase.vout.push(Vout {
            value: 625_000_000,
            scriptpubkey_address: Some("bc1qminer".to_string()),
            ..Default::default()
        });
        coinbase.vout.push(Vout {
            value: 0,
            scriptpubkey_type: "op_return".to_string(),
            ..Default::default()
        });

        let stripped = coinbase.strip_coinbase();
        assert_eq!(stripped.vin.len(), 1);
        assert_eq!(stripped.vin[0].scriptsig, "03abcdef");
        assert_eq!(stripped.vout.len(), 1);
        assert_eq!(stripped.vout[0].value, 625_000_000);
    }

    #[test]
    fn test_touches_address() {
        let mut tx = tx(1000, 800);
        tx.vout.push(Vout {
            scriptpubkey_address: Some("bc1qdest".to_string()),
            value: 5000,
            ..Default::default()
        });
        tx.vin.push(Vin {
            prevout: Some(Vout {
                scriptpubkey_address: Some("bc1qsource".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });

        assert!(tx.touches_address("bc1qdest"));
        assert!(tx.touches_address("bc1qsource"));
        assert!(!tx.touches_address("bc1qother"));
    }

    #[test]
    fn test_indexer_json_shape() {
        let json = r#"{
            "txid": "ab",
            "version": 2,
            "locktime": 0,
            "size": 222,
            "weight": 561,
            "fee": 1410,
            "vin": [{"txid": "cd", "vout": 1, "prevout": null, "scriptsig": "",
                     "scriptsig_asm": "", "is_coinbase": false, "sequence": 4294967293}],
            "vout": [{"scriptpubkey": "0014", "scriptpubkey_asm": "OP_0",
                      "scriptpubkey_type": "v0_p2wpkh", "scriptpubkey_address": "bc1q", "value": 1000}],
            "status": {"confirmed": false}
        }"#;
        let tx: ExtendedTransaction = serde_json::from_str(json).unwrap();
        let tx = tx.extend();
        assert_eq!(tx.vsize, 140.25);
        assert!(tx.signals_rbf());
        assert!(!tx.status.confirmed);

        let value = serde_json::to_value(&tx).unwrap();
        assert!(value.get("feePerVsize").is_some());
        assert!(value.get("firstSeen").is_none());
    }
}
