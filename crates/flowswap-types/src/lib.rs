//! # flowswap-types
//!
//! Shared types, errors, and configuration for the **flowswap** streaming
//! exchange.
//!
//! This crate is the leaf dependency of the workspace: every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`MarketId`], [`DepositorId`], [`VaultId`], [`PositionKey`]
//! - **Sides**: [`Side`]
//! - **Fixed-point math**: [`fixed`] (`VOLUME_SCALE` / `BOOK_SCALE` helpers)
//! - **Receipts**: [`DepositReceipt`], [`WithdrawReceipt`], [`CloseReceipt`]
//! - **Configuration**: [`EngineConfig`], [`MarketParams`]
//! - **Errors**: [`FlowswapError`] with `FS_ERR_` prefix codes
//! - **Constants**: scales, ring capacities and defaults

pub mod config;
pub mod constants;
pub mod error;
pub mod fixed;
pub mod ids;
pub mod receipt;
pub mod side;

// Re-export all primary types at crate root for ergonomic imports:
//   use flowswap_types::{Side, PositionKey, FlowswapError, ...};

pub use config::*;
pub use error::*;
pub use ids::*;
pub use receipt::*;
pub use side::*;

// Constants and fixed-point helpers are accessed via
// `flowswap_types::constants::FOO` / `flowswap_types::fixed::foo`.
