//! The market: live aggregate flow per side and the bucket geometry.
//!
//! Flow rates only ever change by exact integer contributions (a deposit's
//! `rate` in, the same `rate` out on expiry or early close), so at any tick
//! `flow_rate(side)` equals the sum of all unexpired positions on that side.

use flowswap_types::{
    DepositorId, FlowswapError, MarketId, MarketParams, Result, Side, VaultId,
};
use serde::{Deserialize, Serialize};

/// One streaming market per asset pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub id: MarketId,
    /// May set the closing tick.
    pub authority: DepositorId,
    /// Custody reference holding asset A.
    pub vault_a: VaultId,
    /// Custody reference holding asset B.
    pub vault_b: VaultId,
    /// Aggregate A streamed per tick (`VOLUME_SCALE`).
    pub flow_rate_a: u64,
    /// Aggregate B streamed per tick (`VOLUME_SCALE`).
    pub flow_rate_b: u64,
    /// Ticks per expiry bucket (power of ten).
    pub bucket_width: u64,
    pub genesis_tick: u64,
    /// New deposits are refused from this tick on.
    pub closing_tick: Option<u64>,
}

impl Market {
    /// Create a market with zero flow on both sides.
    ///
    /// # Errors
    /// `InvalidSlotInterval` if `bucket_width` is not a power of ten.
    pub fn new(id: MarketId, authority: DepositorId, params: &MarketParams) -> Result<Self> {
        if !is_power_of_ten(params.bucket_width) {
            return Err(FlowswapError::InvalidSlotInterval(params.bucket_width));
        }
        Ok(Self {
            id,
            authority,
            vault_a: VaultId::derive(id, Side::A),
            vault_b: VaultId::derive(id, Side::B),
            flow_rate_a: 0,
            flow_rate_b: 0,
            bucket_width: params.bucket_width,
            genesis_tick: params.genesis_tick,
            closing_tick: params.closing_tick,
        })
    }

    #[must_use]
    pub fn flow_rate(&self, side: Side) -> u64 {
        match side {
            Side::A => self.flow_rate_a,
            Side::B => self.flow_rate_b,
        }
    }

    #[must_use]
    pub fn vault(&self, side: Side) -> VaultId {
        match side {
            Side::A => self.vault_a,
            Side::B => self.vault_b,
        }
    }

    fn flow_rate_mut(&mut self, side: Side) -> &mut u64 {
        match side {
            Side::A => &mut self.flow_rate_a,
            Side::B => &mut self.flow_rate_b,
        }
    }

    /// Add a position's contribution to the side's flow.
    pub fn add_flow(&mut self, side: Side, rate: u64) -> Result<()> {
        let flow = self.flow_rate_mut(side);
        *flow = flow
            .checked_add(rate)
            .ok_or(FlowswapError::ArithmeticOverflow("market flow rate"))?;
        Ok(())
    }

    /// Remove a contribution (expiry or early close).
    pub fn remove_flow(&mut self, side: Side, rate: u64) -> Result<()> {
        let flow = self.flow_rate_mut(side);
        let current = *flow;
        *flow = current
            .checked_sub(rate)
            .ok_or_else(|| FlowswapError::FlowUnderflow {
                reason: format!("side {side} flow {current} < removed {rate}"),
            })?;
        Ok(())
    }

    /// Whether both sides stream, i.e. an exchange rate exists.
    #[must_use]
    pub fn is_trading(&self) -> bool {
        self.flow_rate_a > 0 && self.flow_rate_b > 0
    }

    /// Whether new positions are accepted at `tick`.
    #[must_use]
    pub fn accepts_deposits_at(&self, tick: u64) -> bool {
        self.closing_tick.is_none_or(|closing| tick < closing)
    }

    /// Flow starts no earlier than genesis.
    #[must_use]
    pub fn effective_start(&self, tick: u64) -> u64 {
        tick.max(self.genesis_tick)
    }

    /// Absolute bucket index holding `tick`.
    #[must_use]
    pub fn bucket_of(&self, tick: u64) -> u64 {
        tick / self.bucket_width
    }

    #[must_use]
    pub fn is_aligned(&self, tick: u64) -> bool {
        tick % self.bucket_width == 0
    }
}

/// `true` for 1, 10, 100, ...
#[must_use]
pub fn is_power_of_ten(n: u64) -> bool {
    if n == 0 {
        return false;
    }
    let mut num = n;
    while num % 10 == 0 {
        num /= 10;
    }
    num == 1
}
