//! Persistence queries for earthquakes, stations, predictions and catalogues
//!
//! Schema creation lives in `seismon_common::db`; this module holds the
//! reads and writes the prediction pipeline issues against it.

pub mod catalogues;
pub mod earthquakes;
pub mod predictions;
pub mod stations;

use chrono::{DateTime, SecondsFormat, Utc};

/// Timestamps are stored as RFC 3339 text at microsecond precision
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}
