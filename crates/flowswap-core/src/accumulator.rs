//! Cumulative exchange-rate indices.
//!
//! The accumulator integrates the instantaneous exchange rate over ticks:
//! ```text
//! cum_a_per_b += elapsed * floor(flow_b * BOOK_SCALE / flow_a)
//! cum_b_per_a += elapsed * floor(flow_a * BOOK_SCALE / flow_b)
//! ```
//! A position streaming `rate` of A between two ticks earns
//! `rate * Δcum_a_per_b / (BOOK_SCALE * VOLUME_SCALE)` of B.
//!
//! The update is linear in `elapsed`, so splitting an interval into any
//! number of sub-intervals with the same rates yields the same indices.

use flowswap_types::{FlowswapError, Result, Side, fixed};
use serde::{Deserialize, Serialize};

/// The indices as they stood at one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub cum_a_per_b: u128,
    pub cum_b_per_a: u128,
    pub idle_ticks: u64,
}

impl IndexSnapshot {
    /// The index a position on `side` settles against.
    #[must_use]
    pub fn index_for(&self, side: Side) -> u128 {
        match side {
            Side::A => self.cum_a_per_b,
            Side::B => self.cum_b_per_a,
        }
    }
}

/// One per market. Monotone in every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeAccumulator {
    /// B earned per unit of A streamed, integrated over ticks (`BOOK_SCALE`).
    pub cum_a_per_b: u128,
    /// A earned per unit of B streamed, integrated over ticks (`BOOK_SCALE`).
    pub cum_b_per_a: u128,
    /// Ticks processed while at least one side had zero flow.
    pub idle_ticks: u64,
    /// Last tick fully integrated.
    pub last_tick: u64,
}

impl ExchangeAccumulator {
    #[must_use]
    pub fn new(last_tick: u64) -> Self {
        Self {
            cum_a_per_b: 0,
            cum_b_per_a: 0,
            idle_ticks: 0,
            last_tick,
        }
    }

    /// Integrate the rates `(flow_a, flow_b)` from `last_tick` up to `to_tick`.
    ///
    /// A `to_tick` at or before `last_tick` is a no-op.
    pub fn accrue(&mut self, flow_a: u64, flow_b: u64, to_tick: u64) -> Result<()> {
        if to_tick <= self.last_tick {
            return Ok(());
        }
        let elapsed = to_tick - self.last_tick;

        match (
            fixed::exchange_ratio(flow_b, flow_a),
            fixed::exchange_ratio(flow_a, flow_b),
        ) {
            (Some(a_per_b), Some(b_per_a)) => {
                let wide = u128::from(elapsed);
                let a_step = a_per_b
                    .checked_mul(wide)
                    .ok_or(FlowswapError::ArithmeticOverflow("cum_a_per_b step"))?;
                let b_step = b_per_a
                    .checked_mul(wide)
                    .ok_or(FlowswapError::ArithmeticOverflow("cum_b_per_a step"))?;
                self.cum_a_per_b = self
                    .cum_a_per_b
                    .checked_add(a_step)
                    .ok_or(FlowswapError::ArithmeticOverflow("cum_a_per_b"))?;
                self.cum_b_per_a = self
                    .cum_b_per_a
                    .checked_add(b_step)
                    .ok_or(FlowswapError::ArithmeticOverflow("cum_b_per_a"))?;
            }
            _ => {
                self.idle_ticks = self
                    .idle_ticks
                    .checked_add(elapsed)
                    .ok_or(FlowswapError::ArithmeticOverflow("idle_ticks"))?;
            }
        }

        self.last_tick = to_tick;
        Ok(())
    }

    #[must_use]
    pub fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            cum_a_per_b: self.cum_a_per_b,
            cum_b_per_a: self.cum_b_per_a,
            idle_ticks: self.idle_ticks,
        }
    }

    #[must_use]
    pub fn index_for(&self, side: Side) -> u128 {
        self.snapshot().index_for(side)
    }
}

#[cfg(test)]
mod tests {
    use flowswap_types::constants::BOOK_SCALE;

    use super::*;

    #[test]
    fn accrues_both_indices() {
        let mut acc = ExchangeAccumulator::new(0);
        // A streams twice as fast as B.
        acc.accrue(2_000_000, 1_000_000, 10).unwrap();
        assert_eq!(acc.cum_a_per_b, 10 * u128::from(BOOK_SCALE) / 2);
        assert_eq!(acc.cum_b_per_a, 10 * 2 * u128::from(BOOK_SCALE));
        assert_eq!(acc.idle_ticks, 0);
        assert_eq!(acc.last_tick, 10);
    }

    #[test]
    fn one_sided_flow_is_idle() {
        let mut acc = ExchangeAccumulator::new(100);
        acc.accrue(5_000, 0, 130).unwrap();
        acc.accrue(0, 0, 150).unwrap();
        assert_eq!(acc.idle_ticks, 50);
        assert_eq!(acc.cum_a_per_b, 0);
        assert_eq!(acc.cum_b_per_a, 0);
        assert_eq!(acc.last_tick, 150);
    }

    #[test]
    fn zero_elapsed_is_noop() {
        let mut acc = ExchangeAccumulator::new(10);
        acc.accrue(3, 7, 20).unwrap();
        let before = acc.clone();
        acc.accrue(3, 7, 20).unwrap();
        acc.accrue(3, 7, 5).unwrap();
        assert_eq!(acc, before);
    }

    #[test]
    fn split_intervals_match_single_interval() {
        let mut whole = ExchangeAccumulator::new(0);
        whole.accrue(7_777, 3_333, 1_000).unwrap();

        let mut parts = ExchangeAccumulator::new(0);
        for t in [1, 17, 400, 999, 1_000] {
            parts.accrue(7_777, 3_333, t).unwrap();
        }
        assert_eq!(whole, parts);
    }

    #[test]
    fn snapshot_selects_index_by_side() {
        let mut acc = ExchangeAccumulator::new(0);
        acc.accrue(1_000_000, 3_000_000, 1).unwrap();
        let snap = acc.snapshot();
        assert_eq!(snap.index_for(Side::A), 3 * u128::from(BOOK_SCALE));
        assert_eq!(snap.index_for(Side::B), 333_333);
    }
}
