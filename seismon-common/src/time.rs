//! Timestamp utilities

use crate::{Error, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse a UTC timestamp as written in earthquake notices
///
/// Accepts RFC 3339 (`2015-09-12T20:32:26Z`, with or without fractional
/// seconds or an explicit offset) and naive ISO forms, which are taken as UTC.
pub fn parse_utc(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(Error::InvalidInput(format!("Unrecognized timestamp: {}", value)))
}

/// Fractional seconds to a chrono duration at microsecond resolution
pub fn seconds_to_duration(seconds: f64) -> Duration {
    Duration::microseconds((seconds * 1e6).round() as i64)
}

/// Fractional days to a chrono duration
pub fn days_to_duration(days: f64) -> Duration {
    seconds_to_duration(days * 86_400.0)
}
