//! Append-only record of applied transfers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::transfer::Transfer;

/// One applied transfer with its sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub seq: u64,
    /// Batch the transfer was applied in. Transfers of one batch share it.
    pub batch: u64,
    pub transfer: Transfer,
    pub applied_at: DateTime<Utc>,
}

/// Transfer journal of a ledger, in application order.
#[derive(Debug, Clone, Default)]
pub struct TransferJournal {
    entries: Vec<JournalEntry>,
    next_batch: u64,
}

impl TransferJournal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successfully applied batch.
    pub fn append_batch(&mut self, transfers: &[Transfer]) {
        let batch = self.next_batch;
        self.next_batch += 1;
        let now = Utc::now();
        for transfer in transfers {
            let seq = self.entries.len() as u64;
            self.entries.push(JournalEntry {
                seq,
                batch,
                transfer: *transfer,
                applied_at: now,
            });
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of batches recorded so far.
    #[must_use]
    pub fn batches(&self) -> u64 {
        self.next_batch
    }
}

#[cfg(test)]
mod tests {
    use flowswap_types::{DepositorId, MarketId, Side, VaultId};

    use super::*;

    #[test]
    fn batches_share_number_and_seq_increases() {
        let vault = VaultId::derive(MarketId::from_bytes([1; 16]), Side::A);
        let owner = DepositorId::numbered(1);
        let t = Transfer::IntoVault {
            owner,
            vault,
            amount: 1,
        };
        let mut journal = TransferJournal::new();
        assert!(journal.is_empty());
        journal.append_batch(&[t, t]);
        journal.append_batch(&[t]);

        assert_eq!(journal.len(), 3);
        assert_eq!(journal.batches(), 2);
        let seqs: Vec<u64> = journal.entries().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(journal.entries()[1].batch, 0);
        assert_eq!(journal.entries()[2].batch, 1);
    }
}
