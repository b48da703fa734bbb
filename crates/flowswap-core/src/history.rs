//! Per-bucket index snapshots.
//!
//! Each time catch-up crosses a bucket boundary it records the indices as
//! they stood exactly at that boundary, before the bucket's expiries are
//! applied. A position that ended at the boundary settles against this
//! snapshot instead of the live indices, so it stops earning at its end tick.
//!
//! The ring keeps the most recent `H` boundaries. A bucket that open
//! positions still end in is also pinned: its snapshot is kept outside the
//! ring until the last of those positions releases it, so an expired
//! position can settle however far the market has moved on. Other lookups
//! older than `H` buckets fail with `SnapshotEvicted`.

use std::collections::BTreeMap;

use flowswap_types::{FlowswapError, Result, Side, fixed};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::accumulator::IndexSnapshot;

/// Indices at one recorded boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Absolute bucket index.
    pub bucket: u64,
    /// Boundary tick of the bucket.
    pub tick: u64,
    pub indices: IndexSnapshot,
}

/// A bucket some open positions end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Pin {
    /// Positions still referencing the bucket.
    refs: u64,
    /// Filled in once catch-up crosses the bucket.
    entry: Option<HistoryEntry>,
}

/// Ring of boundary snapshots plus the pinned end buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceHistory {
    entries: Vec<Option<HistoryEntry>>,
    pins: BTreeMap<u64, Pin>,
}

impl PriceHistory {
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(FlowswapError::InvalidScheduleCapacity(capacity));
        }
        Ok(Self {
            entries: vec![None; capacity],
            pins: BTreeMap::new(),
        })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    fn slot(&self, bucket: u64) -> usize {
        (bucket % self.capacity() as u64) as usize
    }

    pub(crate) fn record(&mut self, entry: HistoryEntry) {
        let slot = self.slot(entry.bucket);
        self.entries[slot] = Some(entry);
        if let Some(pin) = self.pins.get_mut(&entry.bucket) {
            pin.entry = Some(entry);
        }
    }

    /// One more open position ends in `bucket`.
    pub(crate) fn pin(&mut self, bucket: u64) {
        self.pins
            .entry(bucket)
            .or_insert(Pin {
                refs: 0,
                entry: None,
            })
            .refs += 1;
    }

    /// A position ending in `bucket` was closed or moved elsewhere.
    ///
    /// # Errors
    /// `FlowUnderflow` if no position holds the bucket.
    pub(crate) fn unpin(&mut self, bucket: u64) -> Result<()> {
        let Some(pin) = self.pins.get_mut(&bucket) else {
            return Err(FlowswapError::FlowUnderflow {
                reason: format!("bucket {bucket} is not pinned"),
            });
        };
        pin.refs -= 1;
        if pin.refs == 0 {
            self.pins.remove(&bucket);
        }
        Ok(())
    }

    /// Open positions ending in `bucket`.
    #[must_use]
    pub fn pin_count(&self, bucket: u64) -> u64 {
        self.pins.get(&bucket).map_or(0, |pin| pin.refs)
    }

    /// Snapshot recorded at `bucket`'s boundary.
    ///
    /// # Errors
    /// `SnapshotEvicted` if the bucket was never recorded, or has been
    /// overwritten and is not pinned.
    pub fn get(&self, bucket: u64) -> Result<HistoryEntry> {
        match self.entries[self.slot(bucket)] {
            Some(entry) if entry.bucket == bucket => Ok(entry),
            _ => self
                .pins
                .get(&bucket)
                .and_then(|pin| pin.entry)
                .ok_or(FlowswapError::SnapshotEvicted { bucket }),
        }
    }

    /// Time-weighted average exchange rate between two recorded boundaries,
    /// in units of the opposite asset per unit of `side`'s asset.
    ///
    /// Idle ticks are excluded from the denominator. Returns `None` when the
    /// market did not trade at all in the window.
    pub fn average_rate(&self, side: Side, from_bucket: u64, to_bucket: u64) -> Result<Option<Decimal>> {
        let from = self.get(from_bucket)?;
        let to = self.get(to_bucket)?;
        if to.tick <= from.tick {
            return Ok(None);
        }
        let idle = to.indices.idle_ticks.saturating_sub(from.indices.idle_ticks);
        let trading_ticks = (to.tick - from.tick).saturating_sub(idle);
        if trading_ticks == 0 {
            return Ok(None);
        }
        let delta = to
            .indices
            .index_for(side)
            .saturating_sub(from.indices.index_for(side));
        let total = fixed::book_to_decimal(delta)?;
        Ok(total.checked_div(Decimal::from(trading_ticks)))
    }
}
