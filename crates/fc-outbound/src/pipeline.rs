//! Pure pipeline stages: resolve → filter → split. Kept
//! free of I/O so each stage is independently testable without a gateway
//! or identity map double.

use fc_common::Urn;
use tracing::debug;

/// Drops every address that doesn't contain the literal `tel:+` substring,
/// logging each drop. Order of the surviving addresses is preserved.
pub fn filter_tel_addresses(addresses: Vec<Urn>) -> Vec<Urn> {
    addresses
        .into_iter()
        .filter(|address| {
            let keep = address.contains("tel:+");
            if !keep {
                debug!(address = %address, "dropping non-tel address from outbound recipient list");
            }
            keep
        })
        .collect()
}

/// Splits `addresses` into order-preserving chunks of at most `group_size`.
/// The union of the returned groups is exactly the input set.
pub fn split_into_groups(addresses: Vec<Urn>, group_size: usize) -> Vec<Vec<Urn>> {
    if addresses.is_empty() {
        return Vec::new();
    }
    addresses
        .chunks(group_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}
