//! Script helpers shared by the node-backed variants.

use sha2::{Digest, Sha256};

/// Map a node output type name to the indexer tag.
pub fn translate_script_type(node_type: &str) -> &'static str {
    match node_type {
        "pubkey" => "p2pk",
        "pubkeyhash" => "p2pkh",
        "scripthash" => "p2sh",
        "witness_v0_keyhash" => "v0_p2wpkh",
        "witness_v0_scripthash" => "v0_p2wsh",
        "witness_v1_taproot" => "v1_p2tr",
        "nonstandard" => "nonstandard",
        "multisig" => "multisig",
        "nulldata" => "op_return",
        _ => "unknown",
    }
}

/// Convert a BTC decimal amount to satoshis.
pub fn btc_to_sats(btc: f64) -> u64 {
    let sats = (btc * 100_000_000.0).round();
    if sats <= 0.0 {
        0
    } else {
        sats as u64
    }
}

/// Rewrite node-style script asm into indexer-style asm.
///
/// Opcodes keep their names except small-integer pushes (`OP_PUSHNUM_<n>`)
/// and the two timelock verifies. Data chunks become explicit push
/// instructions followed by the hex payload.
pub fn convert_script_asm(asm: &str) -> String {
    asm.split_whitespace()
        .map(convert_chunk)
        .collect::<Vec<_>>()
        .join(" ")
}

fn convert_chunk(chunk: &str) -> String {
    if let Some(name) = chunk.strip_prefix("OP_") {
        if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
            return format!("OP_PUSHNUM_{name}");
        }
        return match name {
            "CHECKSEQUENCEVERIFY" => "OP_CSV".to_string(),
            "CHECKLOCKTIMEVERIFY" => "OP_CLTV".to_string(),
            _ => chunk.to_string(),
        };
    }

    match chunk {
        "0" => return "OP_0".to_string(),
        "-1" => return "OP_PUSHNUM_NEG1".to_string(),
        _ => {}
    }
    if let Ok(n) = chunk.parse::<u8>() {
        if (1..=16).contains(&n) {
            return format!("OP_PUSHNUM_{n}");
        }
    }

    // Signatures carry their sighash flag as a suffix.
    let data = chunk.replace("[ALL]", "01");
    if data.len() % 2 != 0 || !data.bytes().all(|b| b.is_ascii_hexdigit()) {
        return data;
    }

    let len = data.len() / 2;
    match len {
        0..=75 => format!("OP_PUSHBYTES_{len} {data}"),
        76..=255 => format!("OP_PUSHDATA1 {data}"),
        _ => format!("OP_PUSHDATA2 {data}"),
    }
}

/// Electrum script hash: SHA-256 of the script bytes, byte-reversed, as hex.
pub fn electrum_script_hash(script_hex: &str) -> Option<String> {
    let script = hex::decode(script_hex).ok()?;
    let mut digest = Sha256::digest(&script).to_vec();
    digest.reverse();
    Some(hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_script_type() {
        assert_eq!(translate_script_type("witness_v0_keyhash"), "v0_p2wpkh");
        assert_eq!(translate_script_type("nulldata"), "op_return");
        assert_eq!(translate_script_type("witness_unknown"), "unknown");
    }

    #[test]
    fn test_btc_to_sats_rounds() {
        assert_eq!(btc_to_sats(0.1), 10_000_000);
        assert_eq!(btc_to_sats(0.00000001), 1);
        assert_eq!(btc_to_sats(6.25), 625_000_000);
    }

    #[test]
    fn test_convert_p2wsh_witness_script() {
        let asm = "OP_2 02aa 03bb OP_2 OP_CHECKMULTISIG";
        assert_eq!(
            convert_script_asm(asm),
            "OP_PUSHNUM_2 OP_PUSHBYTES_2 02aa OP_PUSHBYTES_2 03bb OP_PUSHNUM_2 OP_CHECKMULTISIG"
        );
    }

    #[test]
    fn test_convert_signature_and_timelocks() {
        assert_eq!(
            convert_script_asm("3044[ALL] 0 OP_CHECKSEQUENCEVERIFY OP_CHECKLOCKTIMEVERIFY"),
            "OP_PUSHBYTES_3 304401 OP_0 OP_CSV OP_CLTV"
        );
    }

    #[test]
    fn test_convert_large_push() {
        let data = "ab".repeat(80);
        assert_eq!(convert_script_asm(&data), format!("OP_PUSHDATA1 {data}"));
    }

    #[test]
    fn test_electrum_script_hash() {
        let script = "76a91489abcdefabbaabbaabbaabbaabbaabbaabbaabba88ac";
        assert_eq!(
            electrum_script_hash(script).as_deref(),
            Some("db46d31e84e16e7fb031b3ab375131a7bb65775c0818dc17fe0d4444efb3d0aa")
        );
        assert!(electrum_script_hash("zz").is_none());
    }
}
