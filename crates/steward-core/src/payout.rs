//! Payout tier resolution.
//!
//! The tier table maps ascending minimum-weight thresholds to fixed
//! reward amounts. Resolution is a step function, not interpolation:
//! the payout is constant within a band, and a weight exactly equal to
//! a threshold belongs to that threshold's band (inclusive lower bound).

use std::collections::BTreeMap;

/// Resolves a work item weight to a payout amount in base units.
///
/// Selects the amount of the largest threshold less than or equal to
/// `weight`. The table is required (as a [`crate::config::DaoConfig`]
/// invariant, validated at load time) to carry a `0` floor entry, so
/// every non-negative weight lands in some band; a negative weight
/// resolves to the floor amount.
#[must_use]
pub fn resolve_payout(tiers: &BTreeMap<u64, u128>, weight: f64) -> u128 {
    let mut resolved = tiers.get(&0).copied().unwrap_or(0);
    for (threshold, amount) in tiers {
        // `as` is lossless here: thresholds are small integers.
        if (*threshold as f64) <= weight {
            resolved = *amount;
        } else {
            break;
        }
    }
    resolved
}
