//! The operation handle of one streaming market.
//!
//! [`StreamingMarket`] owns a market's engine state and its positions and
//! exposes every externally visible operation. Each state-changing call
//! runs the same five steps:
//! 1. Stage the catch-up to the caller's tick (pure, bounded)
//! 2. Validate and plan the operation against the staged state
//! 3. Execute the planned custody transfers as one atomic batch
//! 4. Commit the staged catch-up together with its stream edits
//! 5. Apply the operation's effect on the position set
//!
//! Any failure before step 4 leaves engine state and custody untouched.

use std::collections::HashMap;

use chrono::Utc;
use flowswap_core::{
    CatchUpOutcome, ExpirySchedule, IndexSnapshot, Market, MarketState, StagedCatchUp,
    state_digest,
};
use flowswap_custody::{Custody, Transfer};
use flowswap_types::{
    CloseReceipt, DepositReceipt, DepositorId, EngineConfig, FlowswapError, MarketId,
    MarketParams, PositionKey, ReceiptType, Result, Side, WithdrawReceipt, fixed,
};
use rust_decimal::Decimal;

use crate::position::Position;
use crate::vault_conservation::VaultConservation;

/// One market, its positions and its vault bookkeeping.
#[derive(Debug, Clone)]
pub struct StreamingMarket {
    config: EngineConfig,
    state: MarketState,
    positions: HashMap<PositionKey, Position>,
    vaults: VaultConservation,
}

impl StreamingMarket {
    /// Zero-initialize an expiry schedule in `storage_len` bytes.
    ///
    /// # Errors
    /// - `Configuration` if `config` is invalid
    /// - `AccountTooSmall` if the storage cannot hold the ring
    pub fn initialize_schedule(config: &EngineConfig, storage_len: usize) -> Result<ExpirySchedule> {
        config.validate()?;
        let schedule = ExpirySchedule::initialize(storage_len, config.schedule_capacity)?;
        tracing::info!(
            capacity = config.schedule_capacity,
            storage_len,
            "Expiry schedule initialized"
        );
        Ok(schedule)
    }

    /// Create the market on top of an initialized schedule.
    ///
    /// # Errors
    /// `InvalidSlotInterval` if the bucket width is not a power of ten.
    pub fn initialize_market(
        config: EngineConfig,
        schedule: ExpirySchedule,
        id: MarketId,
        authority: DepositorId,
        params: &MarketParams,
        current_tick: u64,
    ) -> Result<Self> {
        config.validate()?;
        let state = MarketState::initialize(
            id,
            authority,
            params,
            current_tick,
            schedule,
            config.history_capacity,
        )?;
        Ok(Self {
            config,
            state,
            positions: HashMap::new(),
            vaults: VaultConservation::new(),
        })
    }

    /// Both initialization steps with exactly sized schedule storage.
    pub fn create(
        config: EngineConfig,
        id: MarketId,
        authority: DepositorId,
        params: &MarketParams,
        current_tick: u64,
    ) -> Result<Self> {
        let storage = flowswap_types::constants::schedule_storage_bytes(config.schedule_capacity);
        let schedule = Self::initialize_schedule(&config, storage)?;
        Self::initialize_market(config, schedule, id, authority, params, current_tick)
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> &MarketState {
        &self.state
    }

    #[must_use]
    pub fn market(&self) -> &Market {
        self.state.market()
    }

    #[must_use]
    pub fn vaults(&self) -> &VaultConservation {
        &self.vaults
    }

    #[must_use]
    pub fn position_key(&self, owner: DepositorId, side: Side) -> PositionKey {
        PositionKey::derive(self.market().id, owner, side)
    }

    #[must_use]
    pub fn position(&self, key: &PositionKey) -> Option<&Position> {
        self.positions.get(key)
    }

    #[must_use]
    pub fn position_of(&self, owner: DepositorId, side: Side) -> Option<&Position> {
        self.positions.get(&self.position_key(owner, side))
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// SHA-256 digest of the engine state.
    #[must_use]
    pub fn digest(&self) -> [u8; 32] {
        state_digest(&self.state)
    }

    // -----------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------

    /// Open a position on `side`, or top up the owner's active one.
    ///
    /// # Errors
    /// - `TickBehindMarket` if `current_tick` is earlier than the market clock
    /// - `CatchUpPending` if the market is too far behind `current_tick`
    /// - `MarketClosed` from the closing tick on
    /// - `DepositTooSmall` below the minimum or when no flow results
    /// - `MisalignedEndTick` / `EndSlotAlreadyPassed` /
    ///   `ScheduleHorizonExceeded` for an unusable end tick
    /// - `PositionAlreadyActive` if the owner's position ended but is not
    ///   closed yet
    /// - any custody error from the transfer
    #[allow(clippy::too_many_lines)]
    pub fn deposit<C: Custody + ?Sized>(
        &mut self,
        owner: DepositorId,
        side: Side,
        amount: u64,
        end_tick: u64,
        current_tick: u64,
        custody: &mut C,
    ) -> Result<DepositReceipt> {
        let mut staged = self.stage(current_tick)?;
        let market = staged.market().clone();

        if !market.accepts_deposits_at(current_tick) {
            return Err(FlowswapError::MarketClosed {
                closing_tick: market.closing_tick.unwrap_or_default(),
            });
        }
        if amount < self.config.min_deposit {
            return Err(FlowswapError::DepositTooSmall {
                amount,
                minimum: self.config.min_deposit,
            });
        }
        let start_tick = market.effective_start(current_tick);
        if !market.is_aligned(end_tick) {
            return Err(FlowswapError::MisalignedEndTick {
                end_tick,
                bucket_width: market.bucket_width,
            });
        }
        let earliest_end = start_tick
            .checked_add(market.bucket_width)
            .ok_or(FlowswapError::ArithmeticOverflow("earliest end tick"))?;
        if end_tick <= earliest_end {
            return Err(FlowswapError::EndSlotAlreadyPassed {
                end_tick,
                start_tick,
            });
        }

        let key = PositionKey::derive(market.id, owner, side);
        let last_tick = staged.accumulator().last_tick;
        let (position, receipt_type) = match self.positions.get(&key) {
            None => {
                let rate = fixed::flow_rate(amount, end_tick - start_tick)?;
                if rate == 0 {
                    return Err(FlowswapError::DepositTooSmall {
                        amount,
                        minimum: self.config.min_deposit,
                    });
                }
                self.state.stage_add_stream(&mut staged, side, end_tick, rate)?;
                let position = Position::open(
                    key,
                    owner,
                    side,
                    amount,
                    rate,
                    start_tick,
                    end_tick,
                    &staged.indices(),
                );
                (position, ReceiptType::PositionOpened)
            }
            Some(existing) => {
                existing.ensure_owner(owner)?;
                if !existing.is_streaming_at(last_tick) {
                    return Err(FlowswapError::PositionAlreadyActive(key));
                }
                let mut position = existing.clone();
                position.settle(&staged.indices(), last_tick)?;
                self.state
                    .stage_remove_stream(&mut staged, side, position.end_tick, position.flow_rate)?;
                let new_end = end_tick.max(position.end_tick);
                let rate = position.restream(start_tick, new_end, amount)?;
                if rate == 0 {
                    return Err(FlowswapError::DepositTooSmall {
                        amount,
                        minimum: self.config.min_deposit,
                    });
                }
                self.state.stage_add_stream(&mut staged, side, new_end, rate)?;
                (position, ReceiptType::PositionToppedUp)
            }
        };

        let vault = market.vault(side);
        custody.execute(&[Transfer::IntoVault {
            owner,
            vault,
            amount,
        }])?;

        self.state.commit(staged);
        self.vaults.record_deposit(vault, amount);

        tracing::info!(
            market = %market.id,
            position = %key,
            %owner,
            %side,
            amount,
            flow_rate = position.flow_rate,
            end_tick = position.end_tick,
            kind = %receipt_type,
            "Deposit committed"
        );

        let receipt = DepositReceipt {
            receipt_type,
            position: key,
            owner,
            side,
            amount,
            flow_rate: position.flow_rate,
            start_tick: position.start_tick,
            end_tick: position.end_tick,
            tick: current_tick,
            issued_at: Utc::now(),
        };
        self.positions.insert(key, position);
        Ok(receipt)
    }

    pub fn deposit_a<C: Custody + ?Sized>(
        &mut self,
        owner: DepositorId,
        amount: u64,
        end_tick: u64,
        current_tick: u64,
        custody: &mut C,
    ) -> Result<DepositReceipt> {
        self.deposit(owner, Side::A, amount, end_tick, current_tick, custody)
    }

    pub fn deposit_b<C: Custody + ?Sized>(
        &mut self,
        owner: DepositorId,
        amount: u64,
        end_tick: u64,
        current_tick: u64,
        custody: &mut C,
    ) -> Result<DepositReceipt> {
        self.deposit(owner, Side::B, amount, end_tick, current_tick, custody)
    }

    /// Pay out what the owner's position on `side` has earned so far, in
    /// the opposite asset.
    ///
    /// # Errors
    /// - `CatchUpPending` if the market is too far behind `current_tick`
    /// - `PositionNotFound` if the owner has no position on `side`
    /// - `NoTokensSwapped` if nothing was earned since the last settlement
    /// - `SnapshotEvicted` if an expired position's end snapshot is missing
    ///   from history
    pub fn withdraw_accrued<C: Custody + ?Sized>(
        &mut self,
        owner: DepositorId,
        side: Side,
        current_tick: u64,
        custody: &mut C,
    ) -> Result<WithdrawReceipt> {
        let staged = self.stage(current_tick)?;
        let mut position = self.load(owner, side)?;
        let (indices, tick) = self.settlement_view(&staged, &position)?;
        position.settle(&indices, tick)?;
        let amount = position.take_payout();
        if amount == 0 {
            return Err(FlowswapError::NoTokensSwapped);
        }

        let vault = staged.market().vault(side.opposite());
        custody.execute(&[Transfer::OutOfVault {
            vault,
            owner,
            amount,
        }])?;

        self.state.commit(staged);
        self.vaults.record_payout(vault, amount);

        tracing::info!(
            market = %self.market().id,
            position = %position.key,
            %owner,
            asset = %side.opposite(),
            amount,
            settled_until = position.settled_until_tick,
            "Accrued proceeds withdrawn"
        );

        let receipt = WithdrawReceipt {
            position: position.key,
            owner,
            asset: side.opposite(),
            amount,
            settled_until_tick: position.settled_until_tick,
            tick: current_tick,
            issued_at: Utc::now(),
        };
        self.positions.insert(position.key, position);
        Ok(receipt)
    }

    /// Withdraw accrued A, earned by the owner's B-side position.
    pub fn withdraw_accrued_a<C: Custody + ?Sized>(
        &mut self,
        owner: DepositorId,
        current_tick: u64,
        custody: &mut C,
    ) -> Result<WithdrawReceipt> {
        self.withdraw_accrued(owner, Side::B, current_tick, custody)
    }

    /// Withdraw accrued B, earned by the owner's A-side position.
    pub fn withdraw_accrued_b<C: Custody + ?Sized>(
        &mut self,
        owner: DepositorId,
        current_tick: u64,
        custody: &mut C,
    ) -> Result<WithdrawReceipt> {
        self.withdraw_accrued(owner, Side::A, current_tick, custody)
    }

    /// Settle and delete the caller's position on `side`.
    ///
    /// Before the end tick the remaining flow leaves the market at once and
    /// the scheduled expiry is withdrawn. Afterwards the position settles
    /// against its end-bucket snapshot and releases it. Unstreamed and idle
    /// principal are refunded.
    pub fn close_position<C: Custody + ?Sized>(
        &mut self,
        caller: DepositorId,
        side: Side,
        current_tick: u64,
        custody: &mut C,
    ) -> Result<CloseReceipt> {
        let mut staged = self.stage(current_tick)?;
        let mut position = self.load(caller, side)?;
        let (indices, tick) = self.settlement_view(&staged, &position)?;
        position.settle(&indices, tick)?;
        let proceeds = position.take_payout();

        let last_tick = staged.accumulator().last_tick;
        let early = position.is_streaming_at(last_tick);
        if early {
            self.state
                .stage_remove_stream(&mut staged, side, position.end_tick, position.flow_rate)?;
        } else {
            self.state.stage_release(&mut staged, position.end_tick)?;
        }
        let refund = position.refund_at(last_tick)?;

        let market = staged.market();
        let proceeds_vault = market.vault(side.opposite());
        let refund_vault = market.vault(side);
        let mut transfers = Vec::with_capacity(2);
        if proceeds > 0 {
            transfers.push(Transfer::OutOfVault {
                vault: proceeds_vault,
                owner: caller,
                amount: proceeds,
            });
        }
        if refund > 0 {
            transfers.push(Transfer::OutOfVault {
                vault: refund_vault,
                owner: caller,
                amount: refund,
            });
        }
        if !transfers.is_empty() {
            custody.execute(&transfers)?;
        }

        self.state.commit(staged);
        self.vaults.record_payout(proceeds_vault, proceeds);
        self.vaults.record_payout(refund_vault, refund);
        self.positions.remove(&position.key);

        tracing::info!(
            market = %self.market().id,
            position = %position.key,
            owner = %caller,
            %side,
            proceeds,
            refund,
            early,
            "Position closed"
        );

        Ok(CloseReceipt {
            position: position.key,
            owner: caller,
            side,
            proceeds,
            refund,
            early,
            tick: current_tick,
            issued_at: Utc::now(),
        })
    }

    pub fn close_position_a<C: Custody + ?Sized>(
        &mut self,
        caller: DepositorId,
        current_tick: u64,
        custody: &mut C,
    ) -> Result<CloseReceipt> {
        self.close_position(caller, Side::A, current_tick, custody)
    }

    pub fn close_position_b<C: Custody + ?Sized>(
        &mut self,
        caller: DepositorId,
        current_tick: u64,
        custody: &mut C,
    ) -> Result<CloseReceipt> {
        self.close_position(caller, Side::B, current_tick, custody)
    }

    /// Advance the market toward `current_tick` by at most one bucket
    /// budget, keeping partial progress. Anyone may call it.
    pub fn trigger_catch_up(&mut self, current_tick: u64) -> Result<CatchUpOutcome> {
        let outcome = self
            .state
            .catch_up(current_tick, self.config.max_buckets_per_call)?;
        tracing::info!(
            market = %self.market().id,
            buckets = outcome.buckets_processed,
            remaining = outcome.remaining_buckets,
            last_tick = outcome.last_tick,
            "Catch-up triggered"
        );
        Ok(outcome)
    }

    /// Stop accepting deposits from `closing_tick` on. Authority only.
    pub fn set_closing_tick(&mut self, caller: DepositorId, closing_tick: u64, current_tick: u64) -> Result<()> {
        self.state.set_closing_tick(caller, closing_tick, current_tick)
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    /// What the owner's position on `side` could withdraw at
    /// `current_tick`, without changing anything.
    pub fn accrued(&self, owner: DepositorId, side: Side, current_tick: u64) -> Result<u64> {
        let staged = self.stage(current_tick)?;
        let position = self.load(owner, side)?;
        let (indices, _) = self.settlement_view(&staged, &position)?;
        let owed = position.accrued(&indices)?;
        position
            .pending_payout
            .checked_add(owed)
            .ok_or(FlowswapError::ArithmeticOverflow("accrued preview"))
    }

    /// Time-weighted average price for `side` between two recorded bucket
    /// boundaries (opposite asset per unit of `side`).
    pub fn average_rate(&self, side: Side, from_tick: u64, to_tick: u64) -> Result<Option<Decimal>> {
        let market = self.market();
        self.state
            .history()
            .average_rate(side, market.bucket_of(from_tick), market.bucket_of(to_tick))
    }

    // -----------------------------------------------------------------
    // Invariants
    // -----------------------------------------------------------------

    /// Check that each side's market flow equals the summed rates of the
    /// positions whose expiry has not fired yet.
    ///
    /// # Errors
    /// `FlowInvariantViolation` on any mismatch.
    pub fn verify_flow_conservation(&self) -> Result<()> {
        let market = self.market();
        let cursor = self.state.schedule().cursor();
        for side in Side::BOTH {
            let expected: u128 = self
                .positions
                .values()
                .filter(|p| p.side == side && market.bucket_of(p.end_tick) >= cursor)
                .map(|p| u128::from(p.flow_rate))
                .sum();
            let actual = market.flow_rate(side);
            if expected != u128::from(actual) {
                return Err(FlowswapError::FlowInvariantViolation {
                    reason: format!("side {side}: market flow {actual} != positions {expected}"),
                });
            }
        }
        Ok(())
    }

    /// Check both vault balances reported by `custody` against the amounts
    /// this market moved through them.
    pub fn verify_vaults<C: Custody + ?Sized>(&self, custody: &C) -> Result<()> {
        for side in Side::BOTH {
            let vault = self.market().vault(side);
            self.vaults.verify(vault, custody.vault_balance(vault)?)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn stage(&self, current_tick: u64) -> Result<StagedCatchUp> {
        let staged = self
            .state
            .stage_catch_up(current_tick, self.config.max_buckets_per_call)?;
        staged.outcome().require_complete()?;
        Ok(staged)
    }

    /// The caller's own position. Keys derive from the caller, so another
    /// depositor's position is never reachable through this lookup.
    fn load(&self, owner: DepositorId, side: Side) -> Result<Position> {
        let position = self
            .position_of(owner, side)
            .ok_or(FlowswapError::PositionNotFound { owner, side })?;
        position.ensure_owner(owner)?;
        Ok(position.clone())
    }

    /// Indices a position settles against: live while it streams, frozen at
    /// its end boundary afterwards.
    fn settlement_view(&self, staged: &StagedCatchUp, position: &Position) -> Result<(IndexSnapshot, u64)> {
        let last_tick = staged.accumulator().last_tick;
        if position.is_streaming_at(last_tick) {
            return Ok((staged.indices(), last_tick));
        }
        let bucket = self.market().bucket_of(position.end_tick);
        let indices = self.state.boundary_snapshot(staged, bucket)?;
        Ok((indices, position.end_tick))
    }
}
