//! Bucketed expiry schedule.
//!
//! A fixed-capacity ring of `N` buckets. Bucket `k` (absolute index,
//! `k = tick / bucket_width`) lives in slot `k % N` and holds the flow that
//! stops when the clock reaches `k * bucket_width`.
//!
//! `cursor` is the absolute index of the next bucket catch-up will drain and
//! `origin_tick = cursor * bucket_width` its boundary. Only buckets in
//! `[cursor, cursor + N)` may hold data: writes outside that window are
//! rejected, so the ring never aliases a live bucket onto one that has not
//! been drained yet.
//!
//! Persisted layout (`2N·8 + 16` bytes, little-endian):
//! ```text
//! token_a[0..N] ‖ token_b[0..N] ‖ cursor ‖ origin_tick
//! ```

use flowswap_types::constants::{SCHEDULE_WORD_BYTES, schedule_storage_bytes};
use flowswap_types::{FlowswapError, Result, Side};

/// Expiring flow per bucket, one ring per side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpirySchedule {
    token_a: Vec<u64>,
    token_b: Vec<u64>,
    cursor: u64,
    origin_tick: u64,
}

impl ExpirySchedule {
    /// Zero-initialize a schedule of `capacity` buckets in storage of
    /// `storage_len` bytes.
    ///
    /// # Errors
    /// - `InvalidScheduleCapacity` for a zero capacity
    /// - `AccountTooSmall` if the storage cannot hold the ring
    pub fn initialize(storage_len: usize, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(FlowswapError::InvalidScheduleCapacity(capacity));
        }
        let required = schedule_storage_bytes(capacity);
        if storage_len < required {
            return Err(FlowswapError::AccountTooSmall {
                required,
                available: storage_len,
            });
        }
        Ok(Self {
            token_a: vec![0; capacity],
            token_b: vec![0; capacity],
            cursor: 0,
            origin_tick: 0,
        })
    }

    /// Convenience: a schedule with exactly enough storage.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::initialize(schedule_storage_bytes(capacity), capacity)
    }

    /// Point the cursor at the bucket holding `tick`. Market creation only.
    pub(crate) fn reset_origin(&mut self, tick: u64, bucket_width: u64) {
        self.cursor = tick / bucket_width;
        self.origin_tick = self.cursor * bucket_width;
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.token_a.len()
    }

    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    #[must_use]
    pub fn origin_tick(&self) -> u64 {
        self.origin_tick
    }

    fn slot(&self, bucket: u64) -> usize {
        // capacity fits in usize, so the remainder does too
        (bucket % self.capacity() as u64) as usize
    }

    /// Expiring flow `(a, b)` recorded for absolute `bucket`.
    ///
    /// Buckets outside the live window read as empty.
    #[must_use]
    pub fn bucket(&self, bucket: u64) -> (u64, u64) {
        if !self.in_window(bucket) {
            return (0, 0);
        }
        let slot = self.slot(bucket);
        (self.token_a[slot], self.token_b[slot])
    }

    /// Whether `bucket` lies in `[cursor, cursor + N)`.
    #[must_use]
    pub fn in_window(&self, bucket: u64) -> bool {
        bucket >= self.cursor && bucket - self.cursor < self.capacity() as u64
    }

    /// Last bucket that may currently be written.
    #[must_use]
    pub fn horizon_bucket(&self) -> u64 {
        self.cursor + self.capacity() as u64 - 1
    }

    /// Record that `rate` of `side` stops at the boundary of `bucket`.
    ///
    /// # Errors
    /// `ScheduleHorizonExceeded` if `bucket` is outside the live window.
    pub fn schedule(&mut self, side: Side, bucket: u64, rate: u64, bucket_width: u64) -> Result<()> {
        if !self.in_window(bucket) {
            return Err(FlowswapError::ScheduleHorizonExceeded {
                end_tick: bucket.saturating_mul(bucket_width),
                horizon: self.horizon_bucket().saturating_mul(bucket_width),
            });
        }
        let slot = self.slot(bucket);
        let cell = match side {
            Side::A => &mut self.token_a[slot],
            Side::B => &mut self.token_b[slot],
        };
        *cell = cell
            .checked_add(rate)
            .ok_or(FlowswapError::ArithmeticOverflow("schedule bucket"))?;
        Ok(())
    }

    /// Withdraw a previously scheduled expiry (position leaving early).
    ///
    /// # Errors
    /// `FlowUnderflow` if the bucket holds less than `rate`, which means the
    /// expiry already fired or was never scheduled.
    pub fn unschedule(&mut self, side: Side, bucket: u64, rate: u64) -> Result<()> {
        if !self.in_window(bucket) {
            return Err(FlowswapError::FlowUnderflow {
                reason: format!("bucket {bucket} already drained (cursor {})", self.cursor),
            });
        }
        let slot = self.slot(bucket);
        let cell = match side {
            Side::A => &mut self.token_a[slot],
            Side::B => &mut self.token_b[slot],
        };
        let current = *cell;
        *cell = current
            .checked_sub(rate)
            .ok_or_else(|| FlowswapError::FlowUnderflow {
                reason: format!("bucket {bucket} side {side} holds {current} < {rate}"),
            })?;
        Ok(())
    }

    /// Zero the buckets `[cursor, new_cursor)` and move the cursor.
    ///
    /// Called only when committing a staged catch-up that already consumed
    /// those buckets' flow.
    pub(crate) fn drain_through(&mut self, new_cursor: u64, bucket_width: u64) {
        let capacity = self.capacity() as u64;
        let span = new_cursor.saturating_sub(self.cursor).min(capacity);
        for bucket in self.cursor..self.cursor + span {
            let slot = self.slot(bucket);
            self.token_a[slot] = 0;
            self.token_b[slot] = 0;
        }
        self.cursor = new_cursor;
        self.origin_tick = new_cursor * bucket_width;
    }

    /// Nonzero buckets as `(absolute bucket, a, b)`, in bucket order.
    #[must_use]
    pub fn pending(&self) -> Vec<(u64, u64, u64)> {
        (self.cursor..=self.horizon_bucket())
            .filter_map(|bucket| {
                let (a, b) = self.bucket(bucket);
                (a != 0 || b != 0).then_some((bucket, a, b))
            })
            .collect()
    }

    /// Serialize to the persisted layout.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(schedule_storage_bytes(self.capacity()));
        for word in self.token_a.iter().chain(self.token_b.iter()) {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out.extend_from_slice(&self.cursor.to_le_bytes());
        out.extend_from_slice(&self.origin_tick.to_le_bytes());
        out
    }

    /// Parse the persisted layout of a ring with `capacity` buckets.
    ///
    /// # Errors
    /// `InvalidLayout` if `bytes` is not exactly `2N·8 + 16` long.
    pub fn decode(bytes: &[u8], capacity: usize) -> Result<Self> {
        let expected = schedule_storage_bytes(capacity);
        if capacity == 0 || bytes.len() != expected {
            return Err(FlowswapError::InvalidLayout {
                expected,
                actual: bytes.len(),
            });
        }
        let mut words = bytes.chunks_exact(SCHEDULE_WORD_BYTES).map(|chunk| {
            let mut buf = [0u8; SCHEDULE_WORD_BYTES];
            buf.copy_from_slice(chunk);
            u64::from_le_bytes(buf)
        });
        let token_a: Vec<u64> = words.by_ref().take(capacity).collect();
        let token_b: Vec<u64> = words.by_ref().take(capacity).collect();
        let cursor = words.next().unwrap_or_default();
        let origin_tick = words.next().unwrap_or_default();
        Ok(Self {
            token_a,
            token_b,
            cursor,
            origin_tick,
        })
    }
}
