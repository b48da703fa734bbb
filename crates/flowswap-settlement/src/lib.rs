//! # flowswap-settlement
//!
//! **Positions and operations of a flowswap market.**
//!
//! This crate turns the pure engine state of `flowswap-core` into a market
//! depositors can use:
//!
//! - **Position**: one streaming deposit per (depositor, market, side), with
//!   the arithmetic that settles it against the cumulative indices
//! - **StreamingMarket**: the handle exposing schedule and market
//!   initialization, deposits, withdrawals of accrued proceeds, closes and
//!   manual catch-up
//! - **VaultConservation**: bookkeeping of what moved through each vault
//!
//! ## Operation shape
//!
//! ```text
//! stage catch-up → validate & plan → custody.execute(batch) → commit → receipt
//! ```
//!
//! Nothing is committed unless custody accepted the whole batch.

pub mod engine;
pub mod position;
pub mod vault_conservation;

pub use engine::StreamingMarket;
pub use position::Position;
pub use vault_conservation::VaultConservation;
