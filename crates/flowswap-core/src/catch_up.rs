//! Bounded, resumable catch-up.
//!
//! Catch-up walks the expiry schedule from its cursor toward a target tick.
//! For every bucket boundary `≤ target` it:
//! 1. integrates the current rates up to the boundary,
//! 2. records the boundary snapshot,
//! 3. subtracts the bucket's expiring flow from the market.
//!
//! Once no boundary `≤ target` is left it integrates up to `target` itself.
//! At most `max_buckets` boundaries are handled per call; a call that stops
//! early leaves `last_tick` on the last boundary it crossed, so the next
//! call resumes from exactly there. The persisted cursor plus `last_tick`
//! is the whole continuation.
//!
//! Staging is pure: [`stage`] reads the committed state and returns a
//! [`StagedCatchUp`] that is only applied by `MarketState::commit`. An
//! operation may stack stream edits (new flows, early exits) on top of the
//! staged catch-up; they are validated against the staged state and land in
//! the same commit.

use flowswap_types::{FlowswapError, Result, Side};
use serde::{Deserialize, Serialize};

use crate::accumulator::{ExchangeAccumulator, IndexSnapshot};
use crate::history::HistoryEntry;
use crate::market::Market;
use crate::schedule::ExpirySchedule;

/// Work done by one catch-up call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatchUpOutcome {
    pub target_tick: u64,
    /// Bucket boundaries crossed by this call.
    pub buckets_processed: u64,
    /// Boundaries `≤ target` still unprocessed.
    pub remaining_buckets: u64,
    /// Accumulator position after the call.
    pub last_tick: u64,
    /// Schedule cursor after the call.
    pub cursor: u64,
}

impl CatchUpOutcome {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.remaining_buckets == 0
    }

    /// Fail with `CatchUpPending` unless the target was reached.
    pub fn require_complete(&self) -> Result<()> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(FlowswapError::CatchUpPending {
                remaining_buckets: self.remaining_buckets,
                target_tick: self.target_tick,
            })
        }
    }
}

/// A change to the expiry schedule staged on top of a catch-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamEdit {
    Schedule { side: Side, bucket: u64, rate: u64 },
    Unschedule { side: Side, bucket: u64, rate: u64 },
    /// A position whose expiry already fired lets go of its end bucket.
    Release { bucket: u64 },
}

/// A catch-up computed against committed state, not yet applied.
#[derive(Debug, Clone)]
pub struct StagedCatchUp {
    pub(crate) base_cursor: u64,
    pub(crate) market: Market,
    pub(crate) accumulator: ExchangeAccumulator,
    pub(crate) cursor: u64,
    pub(crate) capacity: usize,
    pub(crate) history: Vec<HistoryEntry>,
    pub(crate) edits: Vec<StreamEdit>,
    pub(crate) outcome: CatchUpOutcome,
}

impl StagedCatchUp {
    /// Market as it will stand once committed.
    #[must_use]
    pub fn market(&self) -> &Market {
        &self.market
    }

    #[must_use]
    pub fn accumulator(&self) -> &ExchangeAccumulator {
        &self.accumulator
    }

    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    #[must_use]
    pub fn outcome(&self) -> &CatchUpOutcome {
        &self.outcome
    }

    /// Boundary snapshot produced by this staging, if it crossed `bucket`.
    #[must_use]
    pub fn history_entry(&self, bucket: u64) -> Option<&HistoryEntry> {
        self.history.iter().find(|entry| entry.bucket == bucket)
    }

    /// Whether `bucket` may be written once this catch-up is committed.
    pub fn check_schedulable(&self, bucket: u64) -> Result<()> {
        let width = self.market.bucket_width;
        let horizon = self.cursor + self.capacity as u64 - 1;
        if bucket < self.cursor || bucket > horizon {
            return Err(FlowswapError::ScheduleHorizonExceeded {
                end_tick: bucket.saturating_mul(width),
                horizon: horizon.saturating_mul(width),
            });
        }
        Ok(())
    }

    /// Live indices at the staged `last_tick`.
    #[must_use]
    pub fn indices(&self) -> IndexSnapshot {
        self.accumulator.snapshot()
    }

    /// Net rate staged into or out of `bucket` for `side` by earlier edits.
    pub(crate) fn pending_delta(&self, side: Side, bucket: u64) -> i128 {
        self.edits
            .iter()
            .map(|edit| match *edit {
                StreamEdit::Schedule { side: s, bucket: b, rate } if s == side && b == bucket => {
                    i128::from(rate)
                }
                StreamEdit::Unschedule { side: s, bucket: b, rate } if s == side && b == bucket => {
                    -i128::from(rate)
                }
                _ => 0,
            })
            .sum()
    }

    /// Net change staged to the number of positions ending in `bucket`.
    pub(crate) fn pending_pin_delta(&self, bucket: u64) -> i128 {
        self.edits
            .iter()
            .map(|edit| match *edit {
                StreamEdit::Schedule { bucket: b, .. } if b == bucket => 1,
                StreamEdit::Unschedule { bucket: b, .. } | StreamEdit::Release { bucket: b }
                    if b == bucket =>
                {
                    -1
                }
                _ => 0,
            })
            .sum()
    }
}

/// A staging that advances nothing, used to apply stream edits on their own.
pub(crate) fn noop(market: &Market, accumulator: &ExchangeAccumulator, schedule: &ExpirySchedule) -> StagedCatchUp {
    StagedCatchUp {
        base_cursor: schedule.cursor(),
        market: market.clone(),
        accumulator: accumulator.clone(),
        cursor: schedule.cursor(),
        capacity: schedule.capacity(),
        history: Vec::new(),
        edits: Vec::new(),
        outcome: CatchUpOutcome {
            target_tick: accumulator.last_tick,
            buckets_processed: 0,
            remaining_buckets: 0,
            last_tick: accumulator.last_tick,
            cursor: schedule.cursor(),
        },
    }
}

/// Compute a catch-up toward `target_tick`, crossing at most `max_buckets`
/// boundaries. Nothing is mutated.
///
/// # Errors
/// `TickBehindMarket` if `target_tick` is earlier than a tick the
/// accumulator already integrated past genesis. Ticks before genesis are
/// accepted and leave the accumulator at genesis.
pub fn stage(
    market: &Market,
    accumulator: &ExchangeAccumulator,
    schedule: &ExpirySchedule,
    target_tick: u64,
    max_buckets: u64,
) -> Result<StagedCatchUp> {
    if target_tick < accumulator.last_tick && accumulator.last_tick > market.genesis_tick {
        return Err(FlowswapError::TickBehindMarket {
            current_tick: target_tick,
            last_tick: accumulator.last_tick,
        });
    }

    let mut market = market.clone();
    let mut accumulator = accumulator.clone();
    let width = market.bucket_width;
    let base_cursor = schedule.cursor();
    let mut cursor = base_cursor;
    let mut history = Vec::new();
    let mut processed = 0u64;

    while processed < max_buckets {
        let boundary = cursor
            .checked_mul(width)
            .ok_or(FlowswapError::ArithmeticOverflow("bucket boundary"))?;
        if boundary > target_tick {
            break;
        }

        // rates as they stood before this bucket's expiries
        accumulator.accrue(market.flow_rate_a, market.flow_rate_b, boundary)?;
        history.push(HistoryEntry {
            bucket: cursor,
            tick: boundary,
            indices: accumulator.snapshot(),
        });

        // out-of-window buckets read empty; their slot belongs to a bucket
        // already consumed earlier in this staging
        let (expiring_a, expiring_b) = schedule.bucket(cursor);
        market.remove_flow(Side::A, expiring_a)?;
        market.remove_flow(Side::B, expiring_b)?;

        cursor += 1;
        processed += 1;
    }

    let next_boundary = cursor.saturating_mul(width);
    let remaining_buckets = if next_boundary > target_tick {
        0
    } else {
        (target_tick - next_boundary) / width + 1
    };
    if remaining_buckets == 0 {
        accumulator.accrue(market.flow_rate_a, market.flow_rate_b, target_tick)?;
    }

    let outcome = CatchUpOutcome {
        target_tick,
        buckets_processed: processed,
        remaining_buckets,
        last_tick: accumulator.last_tick,
        cursor,
    };

    Ok(StagedCatchUp {
        base_cursor,
        market,
        accumulator,
        cursor,
        capacity: schedule.capacity(),
        history,
        edits: Vec::new(),
        outcome,
    })
}
