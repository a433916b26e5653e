//! Format checks for tracked ids. Anything failing them clears the field.

const BASE58: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
const BECH32: &[u8] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Length of a donation id.
pub const DONATION_ID_LENGTH: usize = 22;

/// 64 hex characters, either case.
pub fn is_valid_txid(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Asset ids share the txid format.
pub fn is_valid_asset_id(value: &str) -> bool {
    is_valid_txid(value)
}

/// Base58 addresses of 26-35 or 80 characters, or a lowercase bech32
/// address with a 2-5 letter prefix and 8-87 data characters.
pub fn is_valid_address(value: &str) -> bool {
    is_base58_address(value) || is_bech32_address(value)
}

fn is_base58_address(value: &str) -> bool {
    matches!(value.len(), 26..=35 | 80) && value.bytes().all(|b| BASE58.contains(&b))
}

fn is_bech32_address(value: &str) -> bool {
    let Some((hrp, data)) = value.split_once('1') else {
        return false;
    };
    matches!(hrp.len(), 2..=5)
        && hrp.bytes().all(|b| b.is_ascii_lowercase())
        && matches!(data.len(), 8..=87)
        && data.bytes().all(|b| BECH32.contains(&b))
}

pub fn is_valid_donation_id(value: &str) -> bool {
    value.chars().count() == DONATION_ID_LENGTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_txid_format() {
        assert!(is_valid_txid(&"aB".repeat(32)));
        assert!(!is_valid_txid(&"a".repeat(63)));
        assert!(!is_valid_txid(&"g".repeat(64)));
        assert!(!is_valid_txid("stop"));
    }

    #[test]
    fn test_address_formats() {
        assert!(is_valid_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"));
        assert!(is_valid_address("3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy"));
        assert!(is_valid_address(
            "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq"
        ));
        assert!(is_valid_address(
            "tb1pqqqqp399et2xygdj5xreqhjjvcmzhxw4aywxecjdzew6hylgvsesf3hn0c"
        ));
        // Base58 excludes 0, O, I and l.
        assert!(!is_valid_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7Divf0O"));
        // Bech32 data excludes "1", "b", "i" and "o".
        assert!(!is_valid_address("bc1qbbbbbbbbbbbb"));
        assert!(!is_valid_address("BC1QAR0SRRR7XFKVY5L643LYDNW9RE59GTZZWF5MDQ"));
        assert!(!is_valid_address(""));
    }

    #[test]
    fn test_donation_id_length() {
        assert!(is_valid_donation_id("abcdefghijklmnopqrstuv"));
        assert!(!is_valid_donation_id("abc"));
    }
}
