//! Time ranges for metric queries.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Half-open query window `[start, end)`; an absent end is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// Everything at or after `start`.
    pub fn since(start: DateTime<Utc>) -> Self {
        Self { start, end: None }
    }

    /// Everything in `[start, end)`.
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// The trailing window of `lookback` ending at (and including) `now`.
    pub fn trailing(now: DateTime<Utc>, lookback: Duration) -> Self {
        Self::between(now - lookback, now + Duration::milliseconds(1))
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && self.end.map_or(true, |end| ts < end)
    }
}
