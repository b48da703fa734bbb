//! Error types for the flowswap streaming exchange.
//!
//! All errors use the `FS_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by category:
//! - 1xx: Validation errors (rejected before any state is touched)
//! - 2xx: Position state errors
//! - 3xx: Capacity / catch-up errors
//! - 4xx: Custody errors
//! - 9xx: General / internal errors

use thiserror::Error;

use crate::{DepositorId, PositionKey, Side, VaultId};

/// Central error enum for all flowswap operations.
#[derive(Debug, Error)]
pub enum FlowswapError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// Bucket width must be a power of ten.
    #[error("FS_ERR_100: Slot interval has to be a power of 10, got {0}")]
    InvalidSlotInterval(u64),

    /// Deposit below the market minimum, or too small to produce any flow.
    #[error("FS_ERR_101: Deposit amount is too small: {amount} (minimum {minimum})")]
    DepositTooSmall { amount: u64, minimum: u64 },

    /// End tick is not a multiple of the bucket width.
    #[error("FS_ERR_102: End tick {end_tick} is not a multiple of bucket width {bucket_width}")]
    MisalignedEndTick { end_tick: u64, bucket_width: u64 },

    /// End tick is not at least one full bucket after the start tick.
    #[error("FS_ERR_103: End slot has already passed: end {end_tick}, start {start_tick}")]
    EndSlotAlreadyPassed { end_tick: u64, start_tick: u64 },

    /// End tick lies beyond what the expiry ring can hold without wrapping
    /// onto a bucket that has not been drained yet.
    #[error("FS_ERR_104: End tick {end_tick} exceeds schedule horizon (last schedulable tick {horizon})")]
    ScheduleHorizonExceeded { end_tick: u64, horizon: u64 },

    /// The market stopped accepting new positions.
    #[error("FS_ERR_105: Market closed to new deposits since tick {closing_tick}")]
    MarketClosed { closing_tick: u64 },

    /// Closing tick is in the past or was already set.
    #[error("FS_ERR_106: Invalid closing tick: {reason}")]
    InvalidClosingTick { reason: String },

    /// The caller's tick is earlier than a tick the market already reached.
    #[error("FS_ERR_107: Tick {current_tick} is behind the market clock at {last_tick}")]
    TickBehindMarket { current_tick: u64, last_tick: u64 },

    // =================================================================
    // Position Errors (2xx)
    // =================================================================
    /// A position for this depositor and side is still streaming.
    #[error("FS_ERR_200: Position already active: {0}")]
    PositionAlreadyActive(PositionKey),

    /// No position exists for this depositor and side.
    #[error("FS_ERR_201: Position not found for {owner} on side {side}")]
    PositionNotFound { owner: DepositorId, side: Side },

    /// Caller does not own the position.
    #[error("FS_ERR_202: Caller {caller} does not own position {key}")]
    NotPositionOwner { caller: DepositorId, key: PositionKey },

    /// Nothing has been exchanged since the last settlement.
    #[error("FS_ERR_203: No tokens have been swapped yet")]
    NoTokensSwapped,

    /// The index snapshot for a bucket was overwritten by newer history.
    #[error("FS_ERR_204: Price snapshot for bucket {bucket} was evicted")]
    SnapshotEvicted { bucket: u64 },

    // =================================================================
    // Capacity / Catch-up Errors (3xx)
    // =================================================================
    /// Schedule storage cannot hold the requested ring.
    #[error("FS_ERR_300: Account is too small: need {required} bytes, have {available}")]
    AccountTooSmall { required: usize, available: usize },

    /// Ring capacities must be non-zero.
    #[error("FS_ERR_301: Invalid schedule capacity: {0}")]
    InvalidScheduleCapacity(usize),

    /// Catch-up stopped on its bucket budget before reaching the current tick.
    #[error("FS_ERR_302: Catch-up pending: {remaining_buckets} buckets behind tick {target_tick}")]
    CatchUpPending {
        remaining_buckets: u64,
        target_tick: u64,
    },

    /// A persisted schedule buffer has the wrong size.
    #[error("FS_ERR_303: Invalid persisted layout: expected {expected} bytes, got {actual}")]
    InvalidLayout { expected: usize, actual: usize },

    // =================================================================
    // Custody Errors (4xx)
    // =================================================================
    /// Depositor wallet cannot cover the transfer.
    #[error("FS_ERR_400: Insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u64, available: u64 },

    /// Market vault cannot cover the payout.
    #[error("FS_ERR_401: Insufficient vault balance: need {needed}, have {available}")]
    InsufficientVaultBalance { needed: u64, available: u64 },

    /// Vault balance diverged from recorded deposits minus payouts.
    #[error("FS_ERR_402: Vault invariant violation: {reason}")]
    VaultInvariantViolation { reason: String },

    /// Custody has no vault under this id.
    #[error("FS_ERR_403: Unknown vault: {0}")]
    UnknownVault(VaultId),

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Fixed-point arithmetic exceeded its integer range.
    #[error("FS_ERR_900: Arithmetic overflow in {0}")]
    ArithmeticOverflow(&'static str),

    /// A flow rate or schedule bucket would go negative.
    #[error("FS_ERR_901: Flow underflow: {reason}")]
    FlowUnderflow { reason: String },

    /// Configuration error (invalid config file, missing fields, etc.).
    #[error("FS_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// Serialization / deserialization error.
    #[error("FS_ERR_903: Serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("FS_ERR_904: I/O error: {0}")]
    Io(String),

    /// Caller lacks the authority for this operation.
    #[error("FS_ERR_905: Unauthorized: {0}")]
    Unauthorized(DepositorId),

    /// Market flow diverged from the sum of its unexpired positions.
    #[error("FS_ERR_906: Flow invariant violation: {reason}")]
    FlowInvariantViolation { reason: String },
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, FlowswapError>;

impl From<std::io::Error> for FlowswapError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for FlowswapError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
