//! Per-depositor streaming positions and their settlement arithmetic.
//!
//! A position on side `S` streams `flow_rate` of `S` per tick between
//! `start_tick` and `end_tick`, and earns the opposite asset at
//! ```text
//! owed = flow_rate * (index_S(now) - accumulator_snapshot) / (BOOK_SCALE * VOLUME_SCALE)
//! ```
//! where `index_A = cum_a_per_b` and `index_B = cum_b_per_a`. Summed over
//! every position of a side this is the opposite side's streamed volume,
//! less flooring dust.
//!
//! Ticks during which the opposite side had no flow exchange nothing. They
//! are counted in `idle_ticks_accrued` and the principal streamed during
//! them is returned when the position closes or is topped up.

use flowswap_core::IndexSnapshot;
use flowswap_types::{DepositorId, FlowswapError, PositionKey, Result, Side, fixed};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub key: PositionKey,
    pub owner: DepositorId,
    pub side: Side,
    /// Principal of the current stream.
    pub locked_amount: u64,
    /// Contribution to the side's market flow (`VOLUME_SCALE`).
    pub flow_rate: u64,
    pub start_tick: u64,
    pub end_tick: u64,
    /// Settling index value at the last settlement.
    pub accumulator_snapshot: u128,
    /// Market idle ticks at the last settlement.
    pub idle_ticks_snapshot: u64,
    /// Idle ticks seen during this position's stream.
    pub idle_ticks_accrued: u64,
    pub settled_until_tick: u64,
    /// Opposite-side proceeds settled but not yet paid out.
    pub pending_payout: u64,
}

impl Position {
    /// A fresh position whose settlement starts at `indices`.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        key: PositionKey,
        owner: DepositorId,
        side: Side,
        amount: u64,
        flow_rate: u64,
        start_tick: u64,
        end_tick: u64,
        indices: &IndexSnapshot,
    ) -> Self {
        Self {
            key,
            owner,
            side,
            locked_amount: amount,
            flow_rate,
            start_tick,
            end_tick,
            accumulator_snapshot: indices.index_for(side),
            idle_ticks_snapshot: indices.idle_ticks,
            idle_ticks_accrued: 0,
            settled_until_tick: start_tick,
            pending_payout: 0,
        }
    }

    pub fn ensure_owner(&self, caller: DepositorId) -> Result<()> {
        if caller == self.owner {
            Ok(())
        } else {
            Err(FlowswapError::NotPositionOwner {
                caller,
                key: self.key,
            })
        }
    }

    /// Whether the stream is still running at `tick`.
    #[must_use]
    pub fn is_streaming_at(&self, tick: u64) -> bool {
        tick < self.end_tick
    }

    /// Opposite asset earned since the last settlement, measured against
    /// `indices`.
    pub fn accrued(&self, indices: &IndexSnapshot) -> Result<u64> {
        let delta = indices
            .index_for(self.side)
            .saturating_sub(self.accumulator_snapshot);
        fixed::accrued_amount(self.flow_rate, delta)
    }

    /// Settle up to `indices` (taken at `tick`), moving the proceeds into
    /// `pending_payout`. Returns the newly settled amount.
    pub fn settle(&mut self, indices: &IndexSnapshot, tick: u64) -> Result<u64> {
        let owed = self.accrued(indices)?;
        let idle = indices.idle_ticks.saturating_sub(self.idle_ticks_snapshot);

        self.pending_payout = self
            .pending_payout
            .checked_add(owed)
            .ok_or(FlowswapError::ArithmeticOverflow("pending payout"))?;
        self.idle_ticks_accrued = self
            .idle_ticks_accrued
            .checked_add(idle)
            .ok_or(FlowswapError::ArithmeticOverflow("idle ticks"))?;
        let index = indices.index_for(self.side);
        self.accumulator_snapshot = self.accumulator_snapshot.max(index);
        self.idle_ticks_snapshot = self.idle_ticks_snapshot.max(indices.idle_ticks);
        self.settled_until_tick = self.settled_until_tick.max(tick);
        Ok(owed)
    }

    /// Take everything settled so far, leaving nothing pending.
    pub fn take_payout(&mut self) -> u64 {
        std::mem::take(&mut self.pending_payout)
    }

    /// Ticks of the stream still ahead of `tick`.
    #[must_use]
    pub fn remaining_ticks(&self, tick: u64) -> u64 {
        self.end_tick.saturating_sub(tick.max(self.start_tick))
    }

    /// Own asset returned on close at `tick`: unstreamed principal plus the
    /// principal streamed during idle ticks.
    pub fn refund_at(&self, tick: u64) -> Result<u64> {
        let ticks = self
            .remaining_ticks(tick)
            .checked_add(self.idle_ticks_accrued)
            .ok_or(FlowswapError::ArithmeticOverflow("refund ticks"))?;
        fixed::streamed_amount(self.flow_rate, ticks)
    }

    /// Restart the stream at `start_tick` with `added` extra principal,
    /// running until `end_tick`. The caller settles first.
    ///
    /// Unstreamed and idle principal of the old stream roll into the new
    /// one. Returns the new flow rate, which is zero when the principal is
    /// too small to stream over the interval.
    pub fn restream(&mut self, start_tick: u64, end_tick: u64, added: u64) -> Result<u64> {
        let carried = self.refund_at(start_tick)?;
        let principal = carried
            .checked_add(added)
            .ok_or(FlowswapError::ArithmeticOverflow("position principal"))?;
        let duration = end_tick.saturating_sub(start_tick);
        let rate = fixed::flow_rate(principal, duration)?;

        self.locked_amount = principal;
        self.flow_rate = rate;
        self.start_tick = start_tick;
        self.end_tick = end_tick;
        self.idle_ticks_accrued = 0;
        self.settled_until_tick = start_tick;
        Ok(rate)
    }
}
