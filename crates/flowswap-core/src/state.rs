//! Per-market engine state, threaded explicitly through every operation.
//!
//! `MarketState` owns the four singletons of a market: the [`Market`], its
//! [`ExchangeAccumulator`], [`ExpirySchedule`] and [`PriceHistory`]. The
//! caller holds it exclusively for the duration of one operation; there is
//! no shared or global state.

use flowswap_types::{DepositorId, FlowswapError, MarketId, MarketParams, Result, Side};

use crate::accumulator::{ExchangeAccumulator, IndexSnapshot};
use crate::catch_up::{self, CatchUpOutcome, StagedCatchUp, StreamEdit};
use crate::history::PriceHistory;
use crate::market::Market;
use crate::schedule::ExpirySchedule;

#[derive(Debug, Clone)]
pub struct MarketState {
    market: Market,
    accumulator: ExchangeAccumulator,
    schedule: ExpirySchedule,
    history: PriceHistory,
}

impl MarketState {
    /// Create a market on top of a freshly initialized schedule.
    ///
    /// A genesis tick in the past is moved up to `current_tick`.
    pub fn initialize(
        id: MarketId,
        authority: DepositorId,
        params: &MarketParams,
        current_tick: u64,
        mut schedule: ExpirySchedule,
        history_capacity: usize,
    ) -> Result<Self> {
        let mut params = params.clone();
        params.genesis_tick = params.genesis_tick.max(current_tick);
        let market = Market::new(id, authority, &params)?;
        schedule.reset_origin(market.genesis_tick, market.bucket_width);

        tracing::info!(
            market = %id,
            genesis_tick = market.genesis_tick,
            bucket_width = market.bucket_width,
            capacity = schedule.capacity(),
            "Market initialized"
        );

        Ok(Self {
            accumulator: ExchangeAccumulator::new(market.genesis_tick),
            history: PriceHistory::with_capacity(history_capacity)?,
            market,
            schedule,
        })
    }

    #[must_use]
    pub fn market(&self) -> &Market {
        &self.market
    }

    #[must_use]
    pub fn accumulator(&self) -> &ExchangeAccumulator {
        &self.accumulator
    }

    #[must_use]
    pub fn schedule(&self) -> &ExpirySchedule {
        &self.schedule
    }

    #[must_use]
    pub fn history(&self) -> &PriceHistory {
        &self.history
    }

    /// Compute, without applying, a catch-up toward `target_tick`.
    pub fn stage_catch_up(&self, target_tick: u64, max_buckets: u64) -> Result<StagedCatchUp> {
        catch_up::stage(
            &self.market,
            &self.accumulator,
            &self.schedule,
            target_tick,
            max_buckets,
        )
    }

    /// Apply a catch-up staged from this exact state, together with any
    /// stream edits stacked on it.
    pub fn commit(&mut self, staged: StagedCatchUp) -> CatchUpOutcome {
        debug_assert_eq!(
            staged.base_cursor,
            self.schedule.cursor(),
            "staged catch-up applied to a different state"
        );
        let width = self.market.bucket_width;
        self.schedule.drain_through(staged.cursor, width);
        for entry in staged.history {
            self.history.record(entry);
        }
        for edit in staged.edits {
            let applied = self.apply_edit(edit, width);
            if let Err(err) = &applied {
                tracing::error!(market = %self.market.id, %err, ?edit, "Staged stream edit rejected on commit");
            }
            // staging validated every edit against this exact state
            debug_assert!(applied.is_ok(), "stream edit {edit:?} rejected on commit");
        }
        self.market = staged.market;
        self.accumulator = staged.accumulator;

        let outcome = staged.outcome;
        if !outcome.is_complete() {
            tracing::warn!(
                market = %self.market.id,
                buckets = outcome.buckets_processed,
                remaining = outcome.remaining_buckets,
                target_tick = outcome.target_tick,
                "Catch-up stopped on bucket budget"
            );
        } else if outcome.buckets_processed > 0 {
            tracing::debug!(
                market = %self.market.id,
                buckets = outcome.buckets_processed,
                last_tick = outcome.last_tick,
                "Catch-up complete"
            );
        }
        outcome
    }

    fn apply_edit(&mut self, edit: StreamEdit, width: u64) -> Result<()> {
        match edit {
            StreamEdit::Schedule { side, bucket, rate } => {
                self.schedule.schedule(side, bucket, rate, width)?;
                self.history.pin(bucket);
            }
            StreamEdit::Unschedule { side, bucket, rate } => {
                self.schedule.unschedule(side, bucket, rate)?;
                self.history.unpin(bucket)?;
            }
            StreamEdit::Release { bucket } => self.history.unpin(bucket)?,
        }
        Ok(())
    }

    /// Stage and commit in one step, keeping partial progress.
    pub fn catch_up(&mut self, target_tick: u64, max_buckets: u64) -> Result<CatchUpOutcome> {
        let staged = self.stage_catch_up(target_tick, max_buckets)?;
        Ok(self.commit(staged))
    }

    /// Expiring rate in `bucket` once `staged` is committed.
    fn staged_bucket(&self, staged: &StagedCatchUp, side: Side, bucket: u64) -> i128 {
        // buckets past the committed window alias slots that commit drains
        let (a, b) = self.schedule.bucket(bucket);
        let committed = match side {
            Side::A => a,
            Side::B => b,
        };
        i128::from(committed) + staged.pending_delta(side, bucket)
    }

    /// Stage a new flow of `rate` on `side` expiring at `end_tick`.
    ///
    /// # Errors
    /// - `ScheduleHorizonExceeded` if the end bucket is outside the window
    ///   the ring will have after `staged` is committed
    /// - `ArithmeticOverflow` if the bucket or the side's flow would overflow
    pub fn stage_add_stream(&self, staged: &mut StagedCatchUp, side: Side, end_tick: u64, rate: u64) -> Result<()> {
        let bucket = self.market.bucket_of(end_tick);
        staged.check_schedulable(bucket)?;
        let after = self.staged_bucket(staged, side, bucket) + i128::from(rate);
        if after > i128::from(u64::MAX) {
            return Err(FlowswapError::ArithmeticOverflow("schedule bucket"));
        }
        staged.market.add_flow(side, rate)?;
        staged.edits.push(StreamEdit::Schedule { side, bucket, rate });
        Ok(())
    }

    /// Stage the early exit of a flow of `rate` on `side` that was due to
    /// expire at `end_tick`.
    ///
    /// # Errors
    /// `FlowUnderflow` if the expiry already fired or the bucket or flow
    /// holds less than `rate`.
    pub fn stage_remove_stream(&self, staged: &mut StagedCatchUp, side: Side, end_tick: u64, rate: u64) -> Result<()> {
        let bucket = self.market.bucket_of(end_tick);
        if bucket < staged.cursor {
            return Err(FlowswapError::FlowUnderflow {
                reason: format!("bucket {bucket} already expired (cursor {})", staged.cursor),
            });
        }
        let held = self.staged_bucket(staged, side, bucket);
        if held < i128::from(rate) {
            return Err(FlowswapError::FlowUnderflow {
                reason: format!("bucket {bucket} side {side} holds {held} < {rate}"),
            });
        }
        self.check_pinned(staged, bucket)?;
        staged.market.remove_flow(side, rate)?;
        staged.edits.push(StreamEdit::Unschedule { side, bucket, rate });
        Ok(())
    }

    /// Stage the release of the end bucket of a position whose expiry has
    /// already fired, once that position is closed.
    ///
    /// # Errors
    /// `FlowUnderflow` if the bucket has not expired yet or no position
    /// holds it.
    pub fn stage_release(&self, staged: &mut StagedCatchUp, end_tick: u64) -> Result<()> {
        let bucket = self.market.bucket_of(end_tick);
        if bucket >= staged.cursor {
            return Err(FlowswapError::FlowUnderflow {
                reason: format!("bucket {bucket} has not expired (cursor {})", staged.cursor),
            });
        }
        self.check_pinned(staged, bucket)?;
        staged.edits.push(StreamEdit::Release { bucket });
        Ok(())
    }

    fn check_pinned(&self, staged: &StagedCatchUp, bucket: u64) -> Result<()> {
        let pins = i128::from(self.history.pin_count(bucket)) + staged.pending_pin_delta(bucket);
        if pins < 1 {
            return Err(FlowswapError::FlowUnderflow {
                reason: format!("no open position ends in bucket {bucket}"),
            });
        }
        Ok(())
    }

    /// Start a flow of `rate` on `side` that expires at `end_tick`, without
    /// advancing the clock.
    pub fn add_stream(&mut self, side: Side, end_tick: u64, rate: u64) -> Result<()> {
        let mut staged = catch_up::noop(&self.market, &self.accumulator, &self.schedule);
        self.stage_add_stream(&mut staged, side, end_tick, rate)?;
        self.commit(staged);
        Ok(())
    }

    /// Stop a flow before its scheduled expiry fires.
    pub fn remove_stream(&mut self, side: Side, end_tick: u64, rate: u64) -> Result<()> {
        let mut staged = catch_up::noop(&self.market, &self.accumulator, &self.schedule);
        self.stage_remove_stream(&mut staged, side, end_tick, rate)?;
        self.commit(staged);
        Ok(())
    }

    /// Indices at the boundary of `bucket`, looking first at a staged
    /// catch-up that may have just crossed it.
    pub fn boundary_snapshot(&self, staged: &StagedCatchUp, bucket: u64) -> Result<IndexSnapshot> {
        if let Some(entry) = staged.history_entry(bucket) {
            return Ok(entry.indices);
        }
        Ok(self.history.get(bucket)?.indices)
    }

    /// Stop accepting new positions from `closing_tick` on.
    pub fn set_closing_tick(&mut self, caller: DepositorId, closing_tick: u64, current_tick: u64) -> Result<()> {
        if caller != self.market.authority {
            return Err(FlowswapError::Unauthorized(caller));
        }
        if let Some(existing) = self.market.closing_tick {
            return Err(FlowswapError::InvalidClosingTick {
                reason: format!("already set to {existing}"),
            });
        }
        if closing_tick < current_tick {
            return Err(FlowswapError::InvalidClosingTick {
                reason: format!("{closing_tick} is before current tick {current_tick}"),
            });
        }
        self.market.closing_tick = Some(closing_tick);
        tracing::info!(market = %self.market.id, closing_tick, "Closing tick set");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(genesis: u64, width: u64, capacity: usize) -> MarketState {
        MarketState::initialize(
            MarketId::from_bytes([1; 16]),
            DepositorId::from_bytes([2; 16]),
            &MarketParams::new(genesis, width),
            0,
            ExpirySchedule::with_capacity(capacity).unwrap(),
            capacity,
        )
        .unwrap()
    }

    #[test]
    fn initialize_aligns_origin() {
        let s = state(2_050, 100, 8);
        assert_eq!(s.schedule().cursor(), 20);
        assert_eq!(s.schedule().origin_tick(), 2_000);
        assert_eq!(s.accumulator().last_tick, 2_050);
        assert_eq!(s.market().genesis_tick, 2_050);
    }

    #[test]
    fn initialize_moves_past_genesis_forward() {
        let s = MarketState::initialize(
            MarketId::new(),
            DepositorId::new(),
            &MarketParams::new(10, 10),
            500,
            ExpirySchedule::with_capacity(4).unwrap(),
            4,
        )
        .unwrap();
        assert_eq!(s.market().genesis_tick, 500);
        assert_eq!(s.accumulator().last_tick, 500);
    }

    #[test]
    fn initialize_rejects_bad_width() {
        let err = MarketState::initialize(
            MarketId::new(),
            DepositorId::new(),
            &MarketParams::new(0, 30),
            0,
            ExpirySchedule::with_capacity(4).unwrap(),
            4,
        )
        .unwrap_err();
        assert!(matches!(err, FlowswapError::InvalidSlotInterval(30)));
    }

    #[test]
    fn stream_lifecycle() {
        let mut s = state(0, 10, 16);
        s.add_stream(Side::A, 50, 700).unwrap();
        assert_eq!(s.market().flow_rate_a, 700);
        assert_eq!(s.schedule().bucket(5), (700, 0));

        s.remove_stream(Side::A, 50, 700).unwrap();
        assert_eq!(s.market().flow_rate_a, 0);
        assert_eq!(s.schedule().bucket(5), (0, 0));
        assert!(s.remove_stream(Side::A, 50, 1).is_err());
    }

    #[test]
    fn catch_up_expires_scheduled_flow() {
        let mut s = state(0, 10, 16);
        s.add_stream(Side::A, 30, 500).unwrap();
        s.add_stream(Side::B, 60, 900).unwrap();

        let outcome = s.catch_up(35, 100).unwrap();
        assert!(outcome.is_complete());
        assert_eq!(s.market().flow_rate_a, 0);
        assert_eq!(s.market().flow_rate_b, 900);
        assert_eq!(s.schedule().cursor(), 4);
        assert_eq!(s.accumulator().last_tick, 35);
        assert!(s.history().get(3).is_ok());
    }

    #[test]
    fn zero_elapsed_catch_up_is_noop() {
        let mut s = state(0, 10, 16);
        s.add_stream(Side::A, 90, 5).unwrap();
        s.add_stream(Side::B, 90, 7).unwrap();
        s.catch_up(42, 100).unwrap();
        let acc = s.accumulator().clone();
        let cursor = s.schedule().cursor();

        let second = s.catch_up(42, 100).unwrap();
        assert_eq!(second.buckets_processed, 0);
        assert_eq!(s.accumulator(), &acc);
        assert_eq!(s.schedule().cursor(), cursor);
    }

    #[test]
    fn boundary_snapshot_prefers_staged() {
        let mut s = state(0, 10, 16);
        s.add_stream(Side::A, 20, 10).unwrap();
        s.add_stream(Side::B, 90, 10).unwrap();
        let staged = s.stage_catch_up(25, 100).unwrap();
        assert!(s.history().get(2).is_err());
        let snap = s.boundary_snapshot(&staged, 2).unwrap();
        assert_eq!(snap.cum_a_per_b, 20 * 1_000_000);
    }

    #[test]
    fn staged_edits_land_with_catch_up() {
        let mut s = state(0, 10, 4);
        s.add_stream(Side::A, 30, 100).unwrap();
        s.add_stream(Side::B, 30, 100).unwrap();

        let mut staged = s.stage_catch_up(15, 100).unwrap();
        // cursor 2 after staging: window 2..=5, bucket 5 aliases drained bucket 1
        s.stage_add_stream(&mut staged, Side::A, 50, 40).unwrap();
        s.stage_remove_stream(&mut staged, Side::B, 30, 100).unwrap();
        assert!(s.stage_remove_stream(&mut staged, Side::B, 30, 1).is_err());
        assert!(s.stage_add_stream(&mut staged, Side::A, 60, 1).is_err());
        assert_eq!(staged.market().flow_rate_a, 140);
        assert_eq!(staged.market().flow_rate_b, 0);
        // nothing applied yet
        assert_eq!(s.market().flow_rate_a, 100);
        assert_eq!(s.schedule().bucket(3), (100, 100));

        s.commit(staged);
        assert_eq!(s.schedule().cursor(), 2);
        assert_eq!(s.schedule().bucket(3), (100, 0));
        assert_eq!(s.schedule().bucket(5), (40, 0));
        assert_eq!(s.market().flow_rate_a, 140);
        assert_eq!(s.market().flow_rate_b, 0);
    }

    #[test]
    fn end_snapshot_kept_until_released() {
        let mut s = MarketState::initialize(
            MarketId::from_bytes([1; 16]),
            DepositorId::from_bytes([2; 16]),
            &MarketParams::new(0, 10),
            0,
            ExpirySchedule::with_capacity(16).unwrap(),
            4,
        )
        .unwrap();
        s.add_stream(Side::A, 20, 5).unwrap();
        s.add_stream(Side::A, 20, 7).unwrap();
        assert_eq!(s.history().pin_count(2), 2);

        // eight boundaries later the ring of four has wrapped twice
        s.catch_up(100, 100).unwrap();
        assert_eq!(s.history().get(2).unwrap().tick, 20);

        let mut staged = s.stage_catch_up(100, 100).unwrap();
        s.stage_release(&mut staged, 20).unwrap();
        s.stage_release(&mut staged, 20).unwrap();
        assert!(s.stage_release(&mut staged, 20).is_err());
        s.commit(staged);
        assert_eq!(s.history().pin_count(2), 0);
        assert!(matches!(
            s.history().get(2),
            Err(FlowswapError::SnapshotEvicted { bucket: 2 })
        ));
    }

    #[test]
    fn release_of_live_bucket_rejected() {
        let mut s = state(0, 10, 16);
        s.add_stream(Side::B, 50, 9).unwrap();
        let mut staged = s.stage_catch_up(10, 100).unwrap();
        assert!(matches!(
            s.stage_release(&mut staged, 50),
            Err(FlowswapError::FlowUnderflow { .. })
        ));
        assert!(s.stage_release(&mut staged, 0).is_err());
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "rejected on commit")]
    fn unvalidated_edit_fails_loudly_on_commit() {
        let mut s = state(0, 10, 16);
        let mut staged = catch_up::noop(&s.market, &s.accumulator, &s.schedule);
        staged.edits.push(StreamEdit::Unschedule {
            side: Side::A,
            bucket: 5,
            rate: 1,
        });
        s.commit(staged);
    }

    #[test]
    fn remove_of_expired_bucket_rejected() {
        let mut s = state(0, 10, 4);
        s.add_stream(Side::A, 20, 5).unwrap();
        s.catch_up(25, 100).unwrap();
        assert!(matches!(
            s.remove_stream(Side::A, 20, 5),
            Err(FlowswapError::FlowUnderflow { .. })
        ));
    }

    #[test]
    fn closing_tick_rules() {
        let mut s = state(0, 10, 4);
        let stranger = DepositorId::from_bytes([9; 16]);
        assert!(matches!(
            s.set_closing_tick(stranger, 100, 0),
            Err(FlowswapError::Unauthorized(_))
        ));
        let authority = s.market().authority;
        assert!(s.set_closing_tick(authority, 5, 10).is_err());
        s.set_closing_tick(authority, 100, 10).unwrap();
        assert_eq!(s.market().closing_tick, Some(100));
        assert!(s.set_closing_tick(authority, 200, 10).is_err());
    }
}
