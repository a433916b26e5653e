//! # Transaction Normalizer
//!
//! Turns Bitcoin Core RPC shapes into the indexer-style records every other
//! component works with. Fee resolution needs extra RPC calls and lives in the
//! full-node adapter; everything here is a pure conversion.

use serde::Deserialize;
use shared_types::{Block, ExtendedTransaction, TxStatus, Vin, Vout};

use super::script::{btc_to_sats, convert_script_asm, translate_script_type};

/// Txid of the genesis coinbase, which the node cannot return by id.
pub const GENESIS_COINBASE_TXID: &str =
    "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";

/// Hash of the genesis block.
pub const GENESIS_BLOCK_HASH: &str =
    "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";

/// Timestamp of the genesis block.
pub const GENESIS_BLOCK_TIME: u64 = 1_231_006_505;

fn final_sequence() -> u32 {
    u32::MAX
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RpcScriptSig {
    #[serde(default)]
    pub asm: String,
    #[serde(default)]
    pub hex: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RpcScriptPubKey {
    #[serde(default)]
    pub asm: String,
    #[serde(default)]
    pub hex: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub address: Option<String>,
    /// Pre-22.0 nodes report a list instead of a single address.
    #[serde(default)]
    pub addresses: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcVin {
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub vout: Option<u32>,
    #[serde(default)]
    pub coinbase: Option<String>,
    #[serde(rename = "scriptSig", default)]
    pub script_sig: Option<RpcScriptSig>,
    #[serde(default)]
    pub txinwitness: Option<Vec<String>>,
    #[serde(default = "final_sequence")]
    pub sequence: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcVout {
    /// Amount in BTC.
    pub value: f64,
    #[serde(default)]
    pub n: u32,
    #[serde(rename = "scriptPubKey", default)]
    pub script_pub_key: RpcScriptPubKey,
}

/// `getrawtransaction <txid> true` result.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcTransaction {
    pub txid: String,
    #[serde(default)]
    pub version: i32,
    #[serde(default)]
    pub locktime: u32,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub weight: u64,
    #[serde(default)]
    pub vin: Vec<RpcVin>,
    #[serde(default)]
    pub vout: Vec<RpcVout>,
    #[serde(default)]
    pub confirmations: Option<u64>,
    #[serde(default)]
    pub blockhash: Option<String>,
    #[serde(default)]
    pub blocktime: Option<u64>,
}

/// `getblock <hash> 1` result. At verbosity 2 `tx` holds full transactions.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcBlock {
    pub hash: String,
    pub height: u64,
    #[serde(default)]
    pub version: u32,
    pub time: u64,
    #[serde(default)]
    pub bits: String,
    #[serde(default)]
    pub nonce: u64,
    #[serde(default)]
    pub difficulty: f64,
    #[serde(default)]
    pub merkleroot: String,
    #[serde(rename = "nTx", default)]
    pub n_tx: u64,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub weight: u64,
    #[serde(default)]
    pub previousblockhash: Option<String>,
    #[serde(default)]
    pub tx: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RpcMempoolFees {
    /// Base fee in BTC.
    #[serde(default)]
    pub base: f64,
}

/// One entry of `getrawmempool true` / `getmempoolentry`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RpcMempoolEntry {
    #[serde(default)]
    pub fees: RpcMempoolFees,
}

/// Stateless RPC to canonical record conversion.
pub struct TransactionNormalizer;

impl TransactionNormalizer {
    pub fn normalize_vout(vout: &RpcVout) -> Vout {
        let spk = &vout.script_pub_key;
        let address = spk.address.clone().or_else(|| {
            spk.addresses
                .as_ref()
                .and_then(|addresses| addresses.first().cloned())
        });

        Vout {
            scriptpubkey: spk.hex.clone(),
            scriptpubkey_asm: convert_script_asm(&spk.asm),
            scriptpubkey_type: translate_script_type(&spk.kind).to_string(),
            scriptpubkey_address: address,
            value: btc_to_sats(vout.value),
            asset: None,
            pegout: None,
        }
    }

    pub fn normalize_vin(vin: &RpcVin) -> Vin {
        let script_sig = vin.script_sig.as_ref();
        Vin {
            txid: vin.txid.clone().unwrap_or_default(),
            vout: vin.vout.unwrap_or(0),
            prevout: None,
            scriptsig: script_sig
                .map(|sig| sig.hex.clone())
                .or_else(|| vin.coinbase.clone())
                .unwrap_or_default(),
            scriptsig_asm: script_sig
                .map(|sig| convert_script_asm(&sig.asm))
                .unwrap_or_default(),
            witness: vin.txinwitness.clone(),
            is_coinbase: vin.coinbase.is_some(),
            sequence: vin.sequence,
            ..Default::default()
        }
    }

    /// Convert a transaction without resolving its fee or prevouts.
    ///
    /// `tip_height` is used to derive the block height from the confirmation
    /// count, as the node does not report it directly.
    pub fn normalize_transaction(rpc: &RpcTransaction, tip_height: u64) -> ExtendedTransaction {
        let status = match rpc.confirmations {
            Some(confirmations) if confirmations > 0 => TxStatus::confirmed_in(
                (tip_height + 1).saturating_sub(confirmations),
                rpc.blockhash.clone().unwrap_or_default(),
                rpc.blocktime.unwrap_or_default(),
            ),
            _ => TxStatus::unconfirmed(),
        };

        ExtendedTransaction {
            txid: rpc.txid.clone(),
            version: rpc.version,
            locktime: rpc.locktime,
            size: rpc.size,
            weight: rpc.weight,
            fee: 0,
            vin: rpc.vin.iter().map(Self::normalize_vin).collect(),
            vout: rpc.vout.iter().map(Self::normalize_vout).collect(),
            status,
            ..Default::default()
        }
        .extend()
    }

    pub fn normalize_block(rpc: &RpcBlock) -> Block {
        Block {
            id: rpc.hash.clone(),
            height: rpc.height,
            version: rpc.version,
            timestamp: rpc.time,
            tx_count: rpc.n_tx,
            size: rpc.size,
            weight: rpc.weight,
            merkle_root: rpc.merkleroot.clone(),
            previousblockhash: rpc.previousblockhash.clone(),
            nonce: rpc.nonce,
            bits: u32::from_str_radix(&rpc.bits, 16).unwrap_or_default(),
            difficulty: rpc.difficulty,
        }
    }
}
