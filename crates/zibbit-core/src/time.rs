// Timestamp normalization, countdown arithmetic and clock-skew correction.
//
// The server stamps events with Unix time in either seconds (Python's
// `datetime.timestamp()`) or milliseconds, and older payloads used RFC 3339
// strings. Everything is normalized to `i64` milliseconds at the edge.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Values below this are interpreted as seconds, at or above as milliseconds.
pub const SECONDS_CUTOFF: f64 = 1e12;

/// Label rendered in place of a countdown once it has run out.
pub const EXPIRED_LABEL: &str = "Done!";

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// Normalize a Unix timestamp to milliseconds.
///
/// Ambiguous for instants within ~31 years of the epoch expressed in
/// milliseconds, which never occur for game deadlines.
pub fn to_millis(ts: f64) -> i64 {
    if ts < SECONDS_CUTOFF {
        (ts * 1000.0).round() as i64
    } else {
        ts.round() as i64
    }
}

/// Parse a textual timestamp: either a number (seconds or milliseconds) or
/// an RFC 3339 date-time such as `2025-04-07T18:52:00Z`.
pub fn parse_timestamp(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(n) = text.parse::<f64>() {
        return n.is_finite().then(|| to_millis(n));
    }
    chrono::DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

/// Milliseconds left until `deadline_ms`, never negative.
pub fn remaining(deadline_ms: i64, now_ms: i64) -> i64 {
    (deadline_ms - now_ms).max(0)
}

/// Render a countdown as `"{m}m {s}s"`, dropping the minutes when zero.
///
/// Partial seconds round up so the display only reads `0s` territory once
/// the deadline has actually passed, at which point `EXPIRED_LABEL` is shown.
pub fn format_duration(ms: i64) -> String {
    if ms <= 0 {
        return EXPIRED_LABEL.to_string();
    }
    let total_secs = (ms + 999) / 1000;
    let minutes = total_secs / 60;
    let seconds = total_secs % 60;
    if minutes == 0 {
        format!("{seconds}s")
    } else {
        format!("{minutes}m {seconds}s")
    }
}

/// Local wall-clock time in Unix milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// A normalized instant in Unix milliseconds.
///
/// Deserializes from a JSON number (seconds or milliseconds), a numeric
/// string, or an RFC 3339 string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const fn from_millis(ms: i64) -> Self {
        Timestamp(ms)
    }

    pub const fn as_millis(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Number(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawTimestamp::deserialize(deserializer)? {
            RawTimestamp::Number(n) if n.is_finite() => Ok(Timestamp(to_millis(n))),
            RawTimestamp::Number(n) => Err(D::Error::custom(format!("invalid timestamp: {n}"))),
            RawTimestamp::Text(s) => parse_timestamp(&s)
                .map(Timestamp)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {s:?}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Clock skew
// ---------------------------------------------------------------------------

/// Offset between the server clock and the local clock.
///
/// Every event carrying `server_time` refreshes the offset so countdowns are
/// computed on the server's timeline even when the local clock drifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSkew {
    offset_ms: i64,
    enabled: bool,
}

impl ClockSkew {
    pub fn new(enabled: bool) -> Self {
        ClockSkew {
            offset_ms: 0,
            enabled,
        }
    }

    /// Record a server timestamp observed at local time `local_now_ms`.
    pub fn observe(&mut self, server_time: Timestamp, local_now_ms: i64) {
        if self.enabled {
            self.offset_ms = server_time.as_millis() - local_now_ms;
        }
    }

    pub fn offset_ms(&self) -> i64 {
        self.offset_ms
    }

    /// Translate a local instant to the server's timeline.
    pub fn server_now(&self, local_now_ms: i64) -> i64 {
        local_now_ms + self.offset_ms
    }
}

impl Default for ClockSkew {
    fn default() -> Self {
        ClockSkew::new(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
