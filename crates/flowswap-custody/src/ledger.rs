//! In-memory custody ledger.
//!
//! Tracks per-(depositor, asset) wallet balances and per-vault balances.
//! A batch of transfers is first applied to a staged overlay of the touched
//! balances; only if every transfer in the batch succeeds is the overlay
//! written back, so a failing batch leaves every balance unchanged.

use std::collections::HashMap;

use flowswap_types::{DepositorId, FlowswapError, Result, VaultId};

use crate::journal::TransferJournal;
use crate::transfer::{Custody, Transfer};

/// Asset code, e.g. `"USDC"`.
pub type Asset = String;

#[derive(Debug, Clone)]
struct Vault {
    asset: Asset,
    balance: u64,
}

/// Reference [`Custody`] implementation backed by hash maps.
#[derive(Debug, Clone, Default)]
pub struct VaultLedger {
    wallets: HashMap<(DepositorId, Asset), u64>,
    vaults: HashMap<VaultId, Vault>,
    journal: TransferJournal,
}

impl VaultLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty vault holding `asset`. Reopening an existing vault
    /// keeps its balance.
    pub fn open_vault(&mut self, vault: VaultId, asset: &str) {
        self.vaults.entry(vault).or_insert_with(|| Vault {
            asset: asset.to_string(),
            balance: 0,
        });
        tracing::debug!(%vault, asset, "Vault opened");
    }

    /// Credit a wallet from outside the system (funding).
    pub fn fund(&mut self, owner: DepositorId, asset: &str, amount: u64) -> Result<()> {
        let entry = self.wallets.entry((owner, asset.to_string())).or_default();
        *entry = entry
            .checked_add(amount)
            .ok_or(FlowswapError::ArithmeticOverflow("wallet balance"))?;
        Ok(())
    }

    #[must_use]
    pub fn wallet_balance(&self, owner: DepositorId, asset: &str) -> u64 {
        self.wallets
            .get(&(owner, asset.to_string()))
            .copied()
            .unwrap_or_default()
    }

    /// Asset held by `vault`.
    pub fn vault_asset(&self, vault: VaultId) -> Result<&str> {
        self.vaults
            .get(&vault)
            .map(|v| v.asset.as_str())
            .ok_or(FlowswapError::UnknownVault(vault))
    }

    /// Sum of all wallets and vaults holding `asset`.
    #[must_use]
    pub fn total_supply(&self, asset: &str) -> u128 {
        let wallets: u128 = self
            .wallets
            .iter()
            .filter(|((_, a), _)| a == asset)
            .map(|(_, balance)| u128::from(*balance))
            .sum();
        let vaults: u128 = self
            .vaults
            .values()
            .filter(|v| v.asset == asset)
            .map(|v| u128::from(v.balance))
            .sum();
        wallets + vaults
    }

    #[must_use]
    pub fn journal(&self) -> &TransferJournal {
        &self.journal
    }
}

impl Custody for VaultLedger {
    fn execute(&mut self, transfers: &[Transfer]) -> Result<()> {
        let mut wallets: HashMap<(DepositorId, Asset), u64> = HashMap::new();
        let mut vaults: HashMap<VaultId, u64> = HashMap::new();

        for transfer in transfers {
            let vault_id = transfer.vault();
            let vault = self
                .vaults
                .get(&vault_id)
                .ok_or(FlowswapError::UnknownVault(vault_id))?;
            let wallet_key = (transfer.owner(), vault.asset.clone());
            let wallet = *wallets
                .entry(wallet_key.clone())
                .or_insert_with(|| self.wallets.get(&wallet_key).copied().unwrap_or_default());
            let held = *vaults.entry(vault_id).or_insert(vault.balance);
            let amount = transfer.amount();

            let (new_wallet, new_held) = match transfer {
                Transfer::IntoVault { .. } => {
                    let debited = wallet.checked_sub(amount).ok_or(
                        FlowswapError::InsufficientBalance {
                            needed: amount,
                            available: wallet,
                        },
                    )?;
                    let credited = held
                        .checked_add(amount)
                        .ok_or(FlowswapError::ArithmeticOverflow("vault balance"))?;
                    (debited, credited)
                }
                Transfer::OutOfVault { .. } => {
                    let debited = held.checked_sub(amount).ok_or(
                        FlowswapError::InsufficientVaultBalance {
                            needed: amount,
                            available: held,
                        },
                    )?;
                    let credited = wallet
                        .checked_add(amount)
                        .ok_or(FlowswapError::ArithmeticOverflow("wallet balance"))?;
                    (credited, debited)
                }
            };
            wallets.insert(wallet_key, new_wallet);
            vaults.insert(vault_id, new_held);
        }

        // every transfer validated: write the overlay back
        self.wallets.extend(wallets);
        for (vault_id, balance) in vaults {
            if let Some(vault) = self.vaults.get_mut(&vault_id) {
                vault.balance = balance;
            }
        }
        self.journal.append_batch(transfers);
        tracing::debug!(transfers = transfers.len(), "Custody batch applied");
        Ok(())
    }

    fn vault_balance(&self, vault: VaultId) -> Result<u64> {
        self.vaults
            .get(&vault)
            .map(|v| v.balance)
            .ok_or(FlowswapError::UnknownVault(vault))
    }
}
