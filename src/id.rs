//! Time utilities for Triagr
//!
//! Helpers for timestamps and durations shared by the scheduler components.

use chrono::{DateTime, Utc};

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Get the current wall-clock time
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Milliseconds elapsed from `since` to `now`, clamped at zero
pub fn elapsed_ms(since: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (now - since).num_milliseconds().max(0) as u64
}

/// Fractional hours elapsed from `since` to `now`, clamped at zero
pub fn hours_between(since: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    elapsed_ms(since, now) as f64 / MS_PER_HOUR
}
