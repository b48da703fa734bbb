//! System-wide constants for the flowswap streaming exchange.
//!
//! `VOLUME_SCALE` and `BOOK_SCALE` are wire-compatible: every client that
//! reads flow rates or cumulative indices must agree on them.

/// Fixed-point scale of flow rates (asset units per tick × `VOLUME_SCALE`).
pub const VOLUME_SCALE: u64 = 1_000_000;

/// Fixed-point scale of the cumulative exchange-rate indices.
pub const BOOK_SCALE: u64 = 1_000_000;

/// Reference capacity of the expiry schedule ring (buckets).
pub const DEFAULT_SCHEDULE_CAPACITY: usize = 640_000;

/// Reference capacity of the per-bucket price history ring (buckets).
pub const DEFAULT_HISTORY_CAPACITY: usize = 420_000;

/// Default ceiling on schedule buckets processed by a single catch-up call.
pub const DEFAULT_MAX_BUCKETS_PER_CALL: u64 = 2_000;

/// Default minimum deposit, in asset base units.
pub const DEFAULT_MIN_DEPOSIT: u64 = 1_000;

/// Bytes per persisted schedule word.
pub const SCHEDULE_WORD_BYTES: usize = 8;

/// Trailing header of the persisted schedule: cursor + origin tick.
pub const SCHEDULE_HEADER_BYTES: usize = 16;

/// Domain separator for position key derivation.
pub const POSITION_KEY_DOMAIN: &[u8] = b"flowswap:position:v1:";

/// Domain separator for the engine state digest.
pub const STATE_DIGEST_DOMAIN: &[u8] = b"flowswap:state:v1:";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "flowswap";

/// Persisted size of an expiry schedule with `capacity` buckets:
/// two `u64` arrays plus the 16-byte header.
#[must_use]
pub const fn schedule_storage_bytes(capacity: usize) -> usize {
    2 * capacity * SCHEDULE_WORD_BYTES + SCHEDULE_HEADER_BYTES
}
