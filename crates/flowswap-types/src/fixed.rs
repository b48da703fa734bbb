//! Fixed-point arithmetic shared by the engine and its clients.
//!
//! Flow rates carry `VOLUME_SCALE`, cumulative indices carry `BOOK_SCALE`.
//! Every helper floors, widens to `u128` for the intermediate product and
//! reports overflow instead of wrapping.

use rust_decimal::Decimal;

use crate::constants::{BOOK_SCALE, VOLUME_SCALE};
use crate::{FlowswapError, Result};

/// `floor(amount * VOLUME_SCALE / duration)`: the per-tick flow of a deposit.
pub fn flow_rate(amount: u64, duration_ticks: u64) -> Result<u64> {
    if duration_ticks == 0 {
        return Err(FlowswapError::ArithmeticOverflow("flow_rate: zero duration"));
    }
    let scaled = u128::from(amount) * u128::from(VOLUME_SCALE);
    u64::try_from(scaled / u128::from(duration_ticks))
        .map_err(|_| FlowswapError::ArithmeticOverflow("flow_rate"))
}

/// `floor(numerator * BOOK_SCALE / denominator)`: how much of the numerator's
/// asset one unit of the denominator's asset buys per tick.
///
/// Returns `None` when either rate is zero (no price exists).
#[must_use]
pub fn exchange_ratio(numerator_rate: u64, denominator_rate: u64) -> Option<u128> {
    if numerator_rate == 0 || denominator_rate == 0 {
        return None;
    }
    Some(u128::from(numerator_rate) * u128::from(BOOK_SCALE) / u128::from(denominator_rate))
}

/// `floor(rate * index_delta / (BOOK_SCALE * VOLUME_SCALE))`: the opposite
/// asset earned by a flow of `rate` while an index moved by `index_delta`.
pub fn accrued_amount(rate: u64, index_delta: u128) -> Result<u64> {
    let product = u128::from(rate)
        .checked_mul(index_delta)
        .ok_or(FlowswapError::ArithmeticOverflow("accrued_amount"))?;
    let scale = u128::from(BOOK_SCALE) * u128::from(VOLUME_SCALE);
    u64::try_from(product / scale).map_err(|_| FlowswapError::ArithmeticOverflow("accrued_amount"))
}

/// `floor(rate * ticks / VOLUME_SCALE)`: principal streamed by `rate` over `ticks`.
pub fn streamed_amount(rate: u64, ticks: u64) -> Result<u64> {
    let product = u128::from(rate) * u128::from(ticks);
    u64::try_from(product / u128::from(VOLUME_SCALE))
        .map_err(|_| FlowswapError::ArithmeticOverflow("streamed_amount"))
}

/// Render a `BOOK_SCALE` fixed-point value as a decimal.
pub fn book_to_decimal(value: u128) -> Result<Decimal> {
    let raw = i128::try_from(value).map_err(|_| FlowswapError::ArithmeticOverflow("book_to_decimal"))?;
    Decimal::try_from_i128_with_scale(raw, BOOK_SCALE.ilog10())
        .map_err(|_| FlowswapError::ArithmeticOverflow("book_to_decimal"))
}
