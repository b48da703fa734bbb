//! # flowswap-core
//!
//! **Pure market state machine for flowswap.**
//!
//! The core knows nothing about custody or positions. It keeps, per market:
//!
//! - **Market**: aggregate flow per side and bucket geometry
//! - **Accumulator**: cumulative exchange-rate indices and idle ticks
//! - **Expiry schedule**: fixed ring of per-bucket expiring flow
//! - **Price history**: index snapshots at every processed boundary
//!
//! and advances them with a bounded, resumable catch-up that is staged
//! purely and committed only once the caller's operation has succeeded.

pub mod accumulator;
pub mod catch_up;
pub mod digest;
pub mod history;
pub mod market;
pub mod schedule;
pub mod state;

pub use accumulator::{ExchangeAccumulator, IndexSnapshot};
pub use catch_up::{CatchUpOutcome, StagedCatchUp};
pub use digest::{state_digest, state_digest_hex, verify_state_digest};
pub use history::{HistoryEntry, PriceHistory};
pub use market::{Market, is_power_of_ten};
pub use schedule::ExpirySchedule;
pub use state::MarketState;
