//! Vault conservation invariant checker.
//!
//! Invariant checked after any sequence of operations:
//! ```text
//! ∀ vault: balance(vault) == Σ(paid in) - Σ(paid out)
//! ```
//!
//! The engine is the only party moving funds through a market's vaults, so
//! any divergence means custody and engine disagree about what happened.

use std::collections::{BTreeSet, HashMap};

use flowswap_types::{FlowswapError, Result, VaultId};

/// Running totals of what the engine moved through each vault.
#[derive(Debug, Clone, Default)]
pub struct VaultConservation {
    /// Principal paid into each vault since creation.
    paid_in: HashMap<VaultId, u128>,
    /// Proceeds and refunds paid out of each vault since creation.
    paid_out: HashMap<VaultId, u128>,
}

impl VaultConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_deposit(&mut self, vault: VaultId, amount: u64) {
        *self.paid_in.entry(vault).or_default() += u128::from(amount);
    }

    pub fn record_payout(&mut self, vault: VaultId, amount: u64) {
        *self.paid_out.entry(vault).or_default() += u128::from(amount);
    }

    #[must_use]
    pub fn total_deposits(&self, vault: VaultId) -> u128 {
        self.paid_in.get(&vault).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn total_payouts(&self, vault: VaultId) -> u128 {
        self.paid_out.get(&vault).copied().unwrap_or_default()
    }

    /// Balance the vault should hold: paid in minus paid out.
    ///
    /// # Errors
    /// `VaultInvariantViolation` if more was paid out than in.
    pub fn expected_balance(&self, vault: VaultId) -> Result<u128> {
        let paid_in = self.total_deposits(vault);
        let paid_out = self.total_payouts(vault);
        paid_in
            .checked_sub(paid_out)
            .ok_or_else(|| FlowswapError::VaultInvariantViolation {
                reason: format!("{vault}: paid out {paid_out} exceeds paid in {paid_in}"),
            })
    }

    /// Check a vault balance reported by custody.
    ///
    /// # Errors
    /// `VaultInvariantViolation` if `actual` differs from the expected balance.
    pub fn verify(&self, vault: VaultId, actual: u64) -> Result<()> {
        let expected = self.expected_balance(vault)?;
        if u128::from(actual) != expected {
            return Err(FlowswapError::VaultInvariantViolation {
                reason: format!(
                    "{vault}: actual balance {actual} != expected {expected} \
                     (paid in={}, paid out={})",
                    self.total_deposits(vault),
                    self.total_payouts(vault),
                ),
            });
        }
        Ok(())
    }

    /// Every vault with recorded movement, in id order.
    #[must_use]
    pub fn tracked_vaults(&self) -> Vec<VaultId> {
        let vaults: BTreeSet<VaultId> = self
            .paid_in
            .keys()
            .chain(self.paid_out.keys())
            .copied()
            .collect();
        vaults.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use flowswap_types::{MarketId, Side};

    use super::*;

    fn vault(side: Side) -> VaultId {
        VaultId::derive(MarketId::from_bytes([4; 16]), side)
    }

    #[test]
    fn untouched_vault_expects_zero() {
        let vc = VaultConservation::new();
        assert_eq!(vc.expected_balance(vault(Side::A)).unwrap(), 0);
        assert!(vc.verify(vault(Side::A), 0).is_ok());
        assert!(vc.tracked_vaults().is_empty());
    }

    #[test]
    fn payouts_reduce_expected() {
        let mut vc = VaultConservation::new();
        vc.record_deposit(vault(Side::A), 1_000);
        vc.record_deposit(vault(Side::A), 500);
        vc.record_payout(vault(Side::A), 300);
        assert_eq!(vc.expected_balance(vault(Side::A)).unwrap(), 1_200);
        assert!(vc.verify(vault(Side::A), 1_200).is_ok());
    }

    #[test]
    fn mismatch_is_violation() {
        let mut vc = VaultConservation::new();
        vc.record_deposit(vault(Side::B), 10);
        let err = vc.verify(vault(Side::B), 11).unwrap_err();
        assert!(matches!(err, FlowswapError::VaultInvariantViolation { .. }));
    }

    #[test]
    fn overdrawn_vault_is_violation() {
        let mut vc = VaultConservation::new();
        vc.record_deposit(vault(Side::A), 5);
        vc.record_payout(vault(Side::A), 6);
        assert!(vc.expected_balance(vault(Side::A)).is_err());
    }

    #[test]
    fn vaults_tracked_independently() {
        let mut vc = VaultConservation::new();
        vc.record_deposit(vault(Side::A), 7);
        vc.record_payout(vault(Side::B), 0);
        assert_eq!(vc.tracked_vaults().len(), 2);
        assert_eq!(vc.total_deposits(vault(Side::B)), 0);
        assert!(vc.verify(vault(Side::A), 7).is_ok());
    }
}
