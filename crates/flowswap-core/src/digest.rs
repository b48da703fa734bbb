//! State digest for cross-replica consistency checks.
//!
//! Every replica applying the same sequence of operations to the same
//! market must hold byte-identical state. The digest commits to the market
//! flows, the accumulator and the persisted schedule layout, so two replicas
//! can compare 32 bytes instead of the whole ring.

use flowswap_types::constants::STATE_DIGEST_DOMAIN;
use sha2::{Digest, Sha256};

use crate::state::MarketState;

/// Compute the digest of a market's engine state.
#[must_use]
pub fn state_digest(state: &MarketState) -> [u8; 32] {
    let market = state.market();
    let acc = state.accumulator();

    let mut hasher = Sha256::new();
    hasher.update(STATE_DIGEST_DOMAIN);
    hasher.update(market.id.0.as_bytes());
    hasher.update(market.flow_rate_a.to_le_bytes());
    hasher.update(market.flow_rate_b.to_le_bytes());
    hasher.update(market.bucket_width.to_le_bytes());
    hasher.update(market.genesis_tick.to_le_bytes());
    hasher.update(market.closing_tick.unwrap_or(u64::MAX).to_le_bytes());
    hasher.update(acc.cum_a_per_b.to_le_bytes());
    hasher.update(acc.cum_b_per_a.to_le_bytes());
    hasher.update(acc.idle_ticks.to_le_bytes());
    hasher.update(acc.last_tick.to_le_bytes());
    hasher.update(state.schedule().encode());

    let result = hasher.finalize();
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&result);
    digest
}

/// Hex form of [`state_digest`], for logs.
#[must_use]
pub fn state_digest_hex(state: &MarketState) -> String {
    hex::encode(state_digest(state))
}

/// Check a state against a digest computed elsewhere.
#[must_use]
pub fn verify_state_digest(state: &MarketState, expected: &[u8; 32]) -> bool {
    state_digest(state) == *expected
}
