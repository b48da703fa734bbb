//! # flowswap-custody
//!
//! **Custody boundary for flowswap.**
//!
//! The settlement layer never touches balances directly. It plans a batch
//! of [`Transfer`]s for each operation and hands it to a [`Custody`]
//! implementation, which applies the whole batch or none of it.
//!
//! - **Custody**: the trait the settlement layer is generic over
//! - **VaultLedger**: in-memory reference implementation with wallets,
//!   vaults and a transfer journal

pub mod journal;
pub mod ledger;
pub mod transfer;

pub use journal::{JournalEntry, TransferJournal};
pub use ledger::{Asset, VaultLedger};
pub use transfer::{Custody, Transfer};
