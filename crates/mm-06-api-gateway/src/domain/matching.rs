//! Address and asset matching for tracked outputs.

use shared_types::ExtendedTransaction;

/// Asset id of the chain's native asset. Tracking it matches peg-ins and
/// peg-outs instead of issuances.
pub const NATIVE_ASSET_ID: &str =
    "6f0279e9ed041c3d710a9f57d0c02928416460c4b722ae3457a11eec381c526d";

pub fn touches_asset(tx: &ExtendedTransaction, asset: &str) -> bool {
    if asset == NATIVE_ASSET_ID {
        return tx.vin.iter().any(|vin| vin.is_pegin == Some(true))
            || tx.vout.iter().any(|vout| vout.pegout.is_some());
    }
    tx.vin.iter().any(|vin| {
        vin.issuance
            .as_ref()
            .is_some_and(|issuance| issuance.asset_id == asset)
    }) || tx.vout.iter().any(|vout| vout.asset.as_deref() == Some(asset))
}

/// True when `tx` matches the connection's tracked address or asset.
pub fn matches_tracked(
    tx: &ExtendedTransaction,
    address: Option<&str>,
    asset: Option<&str>,
) -> bool {
    address.is_some_and(|address| tx.touches_address(address))
        || asset.is_some_and(|asset| touches_asset(tx, asset))
}
