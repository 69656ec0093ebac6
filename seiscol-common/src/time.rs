//! Timestamp utilities
//!
//! Waveform start times are `DateTime<Utc>` with nanosecond resolution.
//! Sample offsets are computed in floating-point seconds and rounded to the
//! nearest nanosecond when converted back to a timestamp.

use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};

/// Nanoseconds per second
pub const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// 1970-01-01T00:00:00Z
///
/// Several file formats write the epoch when the real start time is unknown.
pub fn epoch() -> DateTime<Utc> {
    Utc.timestamp_nanos(0)
}

/// Build a timestamp from (possibly fractional) seconds since the epoch.
pub fn from_epoch_seconds(seconds: f64) -> DateTime<Utc> {
    Utc.timestamp_nanos((seconds * NANOS_PER_SECOND).round() as i64)
}

/// Signed number of seconds from `earlier` to `later`.
pub fn seconds_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> f64 {
    let span = later.signed_duration_since(earlier);
    match span.num_nanoseconds() {
        Some(nanos) => nanos as f64 / NANOS_PER_SECOND,
        // Spans beyond ~292 years overflow i64 nanoseconds
        None => span.num_milliseconds() as f64 / 1_000.0,
    }
}

/// Shift a timestamp by a floating-point number of seconds.
pub fn add_seconds(time: DateTime<Utc>, seconds: f64) -> DateTime<Utc> {
    time + Duration::nanoseconds((seconds * NANOS_PER_SECOND).round() as i64)
}

/// Timestamp of sample `index` on a grid starting at `start` with spacing `delta` seconds.
pub fn sample_time(start: DateTime<Utc>, delta: f64, index: usize) -> DateTime<Utc> {
    add_seconds(start, delta * index as f64)
}

/// ISO-8601 rendering with microsecond precision, used in summaries and logs.
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}
