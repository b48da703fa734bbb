//! Identifiers used throughout flowswap.
//!
//! Markets and depositors use UUIDv7 for time-ordered sorting. Vaults and
//! positions are *derived* from their parents with SHA-256, so every replica
//! computes the same key for the same (market, owner, side).

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{Side, constants};

// ---------------------------------------------------------------------------
// MarketId
// ---------------------------------------------------------------------------

/// Unique identifier for a streaming market (one per asset pair).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct MarketId(pub Uuid);

impl MarketId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for MarketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "market:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// DepositorId
// ---------------------------------------------------------------------------

/// Unique identifier for a depositor / wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct DepositorId(pub Uuid);

impl DepositorId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for DepositorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DepositorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic and random depositors for tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl DepositorId {
    /// Depositor whose id encodes `n`; stable across runs.
    #[must_use]
    pub fn numbered(n: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[8..].copy_from_slice(&n.to_be_bytes());
        Self(Uuid::from_bytes(bytes))
    }

    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::from_bytes(rand::random::<[u8; 16]>()))
    }
}

// ---------------------------------------------------------------------------
// VaultId
// ---------------------------------------------------------------------------

/// Opaque custody reference for one side's vault of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct VaultId(pub Uuid);

impl VaultId {
    /// Vault of `side` for `market`. Deterministic.
    #[must_use]
    pub fn derive(market: MarketId, side: Side) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"flowswap:vault:v1:");
        hasher.update(market.0.as_bytes());
        hasher.update([side.tag()]);
        let hash = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash[..16]);
        Self(Uuid::from_bytes(bytes))
    }
}

impl fmt::Display for VaultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vault:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PositionKey
// ---------------------------------------------------------------------------

/// Address of a position: `SHA-256(domain ‖ market ‖ owner ‖ side)`.
///
/// One position exists per (depositor, market, side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PositionKey(pub [u8; 32]);

impl PositionKey {
    #[must_use]
    pub fn derive(market: MarketId, owner: DepositorId, side: Side) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(constants::POSITION_KEY_DOMAIN);
        hasher.update(market.0.as_bytes());
        hasher.update(owner.0.as_bytes());
        hasher.update([side.tag()]);
        let mut key = [0u8; 32];
        key.copy_from_slice(&hasher.finalize());
        Self(key)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pos:{}", hex::encode(&self.0[..8]))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depositor_id_uniqueness() {
        let a = DepositorId::new();
        let b = DepositorId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn market_id_ordering() {
        let a = MarketId::new();
        let b = MarketId::new();
        assert!(a < b);
    }

    #[test]
    fn position_key_deterministic() {
        let market = MarketId::from_bytes([1; 16]);
        let owner = DepositorId::from_bytes([2; 16]);
        let a = PositionKey::derive(market, owner, Side::A);
        let b = PositionKey::derive(market, owner, Side::A);
        assert_eq!(a, b);
        assert_ne!(a, PositionKey::derive(market, owner, Side::B));
        assert_ne!(
            a,
            PositionKey::derive(market, DepositorId::from_bytes([3; 16]), Side::A)
        );
    }

    #[test]
    fn vaults_differ_per_side() {
        let market = MarketId::from_bytes([9; 16]);
        assert_ne!(
            VaultId::derive(market, Side::A),
            VaultId::derive(market, Side::B)
        );
        assert_eq!(
            VaultId::derive(market, Side::A),
            VaultId::derive(market, Side::A)
        );
    }

    #[test]
    fn position_key_display_is_hex() {
        let key = PositionKey([0xab; 32]);
        assert_eq!(format!("{key}"), "pos:abababababababab");
        assert_eq!(key.short(), "abababab");
    }

    #[test]
    fn serde_roundtrips() {
        let id = DepositorId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: DepositorId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
