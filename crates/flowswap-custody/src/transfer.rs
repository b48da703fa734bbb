//! The custody boundary.
//!
//! The engine never holds assets itself. Every movement of funds is a
//! [`Transfer`] between a depositor wallet and one of the market's vaults,
//! handed to a [`Custody`] implementation that applies a whole batch or
//! nothing.

use flowswap_types::{DepositorId, Result, VaultId};
use serde::{Deserialize, Serialize};

/// One movement of funds across the custody boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transfer {
    /// Wallet → vault (deposit principal).
    IntoVault {
        owner: DepositorId,
        vault: VaultId,
        amount: u64,
    },
    /// Vault → wallet (proceeds, refunds).
    OutOfVault {
        vault: VaultId,
        owner: DepositorId,
        amount: u64,
    },
}

impl Transfer {
    #[must_use]
    pub fn amount(&self) -> u64 {
        match self {
            Self::IntoVault { amount, .. } | Self::OutOfVault { amount, .. } => *amount,
        }
    }

    #[must_use]
    pub fn vault(&self) -> VaultId {
        match self {
            Self::IntoVault { vault, .. } | Self::OutOfVault { vault, .. } => *vault,
        }
    }

    #[must_use]
    pub fn owner(&self) -> DepositorId {
        match self {
            Self::IntoVault { owner, .. } | Self::OutOfVault { owner, .. } => *owner,
        }
    }
}

/// Custody of depositor wallets and market vaults.
///
/// Implementations must be all-or-nothing per [`Custody::execute`] call:
/// if any transfer in the batch fails, no balance changes.
pub trait Custody {
    /// Apply a batch of transfers atomically.
    ///
    /// # Errors
    /// - `InsufficientBalance` if a wallet cannot cover an `IntoVault`
    /// - `InsufficientVaultBalance` if a vault cannot cover an `OutOfVault`
    /// - `UnknownVault` if a vault does not exist
    fn execute(&mut self, transfers: &[Transfer]) -> Result<()>;

    /// Current balance held by `vault`.
    fn vault_balance(&self, vault: VaultId) -> Result<u64>;

    /// Move `amount` from `owner`'s wallet into `vault`.
    fn deposit_to_vault(&mut self, owner: DepositorId, vault: VaultId, amount: u64) -> Result<()> {
        self.execute(&[Transfer::IntoVault {
            owner,
            vault,
            amount,
        }])
    }

    /// Pay `amount` out of `vault` to `owner`'s wallet.
    fn pay_from_vault(&mut self, vault: VaultId, owner: DepositorId, amount: u64) -> Result<()> {
        self.execute(&[Transfer::OutOfVault {
            vault,
            owner,
            amount,
        }])
    }
}

#[cfg(test)]
mod tests {
    use flowswap_types::{MarketId, Side};

    use super::*;

    #[test]
    fn accessors_cover_both_directions() {
        let owner = DepositorId::numbered(1);
        let vault = VaultId::derive(MarketId::from_bytes([1; 16]), Side::A);
        let into = Transfer::IntoVault {
            owner,
            vault,
            amount: 5,
        };
        let out = Transfer::OutOfVault {
            vault,
            owner,
            amount: 7,
        };
        assert_eq!(into.amount(), 5);
        assert_eq!(out.amount(), 7);
        assert_eq!(into.vault(), out.vault());
        assert_eq!(into.owner(), owner);
    }

    #[test]
    fn transfer_serde_tagged_by_direction() {
        let t = Transfer::OutOfVault {
            vault: VaultId::derive(MarketId::from_bytes([2; 16]), Side::B),
            owner: DepositorId::numbered(3),
            amount: 42,
        };
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("OutOfVault"));
        let back: Transfer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
