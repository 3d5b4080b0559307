//! Consensus slot to wall-clock conversion.
//!
//! Anchored at the merge: slot 4700013 was proposed at 2022-09-15 06:42:59 UTC
//! and every slot after it lasts exactly 12 seconds.

use chrono::{DateTime, Utc};
use schnellru::{ByLength, LruMap};

use crate::types::Slot;

/// Slot of the merge block.
pub const MERGE_SLOT: Slot = 4_700_013;

/// Unix timestamp (seconds) of [`MERGE_SLOT`].
pub const MERGE_TIMESTAMP_SECS: i64 = 1_663_224_179;

/// Slot duration in seconds.
pub const SLOT_DURATION_SECS: i64 = 12;

/// Daily batch key format used for bid archive file names.
pub const DATE_FORMAT: &str = "%Y%m%d";

const DEFAULT_CACHE_LEN: u32 = 1000;

/// Returns the wall-clock start of `slot`.
pub fn slot_to_timestamp(slot: Slot) -> DateTime<Utc> {
    let slot = i64::try_from(slot).unwrap_or(i64::MAX);
    let gap = slot.saturating_sub(MERGE_SLOT as i64);
    let secs = MERGE_TIMESTAMP_SECS.saturating_add(gap.saturating_mul(SLOT_DURATION_SECS));
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Returns the slot containing `timestamp`.
///
/// Elapsed time since the merge is divided by the slot duration with
/// truncation toward zero. Times before genesis clamp to slot 0.
pub fn timestamp_to_slot(timestamp: DateTime<Utc>) -> Slot {
    let elapsed_ms = timestamp
        .timestamp_millis()
        .saturating_sub(MERGE_TIMESTAMP_SECS * 1000);
    let gap = elapsed_ms / (SLOT_DURATION_SECS * 1000);
    (MERGE_SLOT as i64).saturating_add(gap).max(0) as Slot
}

/// Formats the UTC calendar day of `timestamp` as `YYYYMMDD`.
pub fn date_key(timestamp: DateTime<Utc>) -> String {
    timestamp.format(DATE_FORMAT).to_string()
}

/// Memoizing wrapper around [`slot_to_timestamp`].
///
/// Slot values repeat heavily within a batch, so recent results are kept in
/// a bounded LRU.
pub struct SlotClock {
    timestamps: LruMap<Slot, DateTime<Utc>, ByLength>,
}

impl SlotClock {
    /// Creates a clock caching up to 1000 slots.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_LEN)
    }

    pub fn with_capacity(len: u32) -> Self {
        Self {
            timestamps: LruMap::new(ByLength::new(len)),
        }
    }

    /// Memoized [`slot_to_timestamp`].
    pub fn timestamp(&mut self, slot: Slot) -> DateTime<Utc> {
        if let Some(ts) = self.timestamps.get(&slot) {
            return *ts;
        }
        let ts = slot_to_timestamp(slot);
        self.timestamps.insert(slot, ts);
        ts
    }
}

impl Default for SlotClock {
    fn default() -> Self {
        Self::new()
    }
}
