//! Timestamp helpers shared by every record in the data model.
//!
//! All timestamps in the system are UTC with microsecond precision, matching the
//! `(seconds, microseconds)` pairs the upstream telescope feed carries on the wire.

use chrono::{DateTime, Duration, SubsecRound, Utc};

pub type Timestamp = DateTime<Utc>;

/// Current time truncated to microsecond precision.
pub fn now() -> Timestamp {
    truncate_to_micros(Utc::now())
}

/// Truncate a timestamp to microsecond precision, discarding any trailing nanoseconds.
pub fn truncate_to_micros(time: Timestamp) -> Timestamp {
    time.trunc_subsecs(6)
}

/// Combine a `(seconds, microseconds)` pair, as carried on the wire, into a timestamp.
pub fn from_seconds_and_micros(seconds: i64, micros: u32) -> Option<Timestamp> {
    let time = DateTime::from_timestamp(seconds, micros * 1_000)?;
    Some(truncate_to_micros(time))
}

/// Format a timestamp as ISO-8601 with microseconds and a `Z` suffix, matching the dump
/// file's `json_serializer`.
pub fn to_dump_string(time: Timestamp) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// `serde(serialize_with = ...)` target for dump timestamp fields; chrono's derived
/// `Serialize` uses `AutoSi` precision and drops trailing zero microseconds, which
/// `to_dump_string`'s fixed-width format does not.
pub fn serialize_dump_time<S>(time: &Timestamp, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&to_dump_string(*time))
}

pub fn seconds(n: i64) -> Duration {
    Duration::seconds(n)
}
