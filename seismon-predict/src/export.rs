//! One-row CSV summaries of newly predicted earthquakes
//!
//! Written to `<export dir>/<event_id>.csv` for pickup by downstream
//! consumers. An existing file is never rewritten.

use std::path::{Path, PathBuf};

use chrono::SecondsFormat;
use serde::Serialize;

use crate::error::{PredictError, PredictResult};
use seismon_common::db::Earthquake;

#[derive(Debug, Serialize)]
struct EventSummary<'a> {
    event_id: &'a str,
    lat: f64,
    lon: f64,
    magnitude: f64,
    depth: f64,
    event_time: String,
    sent: String,
}

/// Summary file path for an event; characters unsafe in file names become `_`
pub fn export_path(directory: &Path, event_id: &str) -> PathBuf {
    let name: String = event_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect();
    directory.join(format!("{}.csv", name))
}

/// Write the summary unless it already exists; returns the path when written
pub fn export_event(directory: &Path, eq: &Earthquake) -> PredictResult<Option<PathBuf>> {
    let path = export_path(directory, &eq.event_id);
    if path.exists() {
        return Ok(None);
    }

    std::fs::create_dir_all(directory)?;
    let csv_error = |e: csv::Error| PredictError::Io(std::io::Error::new(std::io::ErrorKind::Other, e));

    let mut writer = csv::Writer::from_path(&path).map_err(csv_error)?;
    writer
        .serialize(EventSummary {
            event_id: &eq.event_id,
            lat: eq.lat,
            lon: eq.lon,
            magnitude: eq.magnitude,
            depth: eq.depth,
            event_time: eq.date.to_rfc3339_opts(SecondsFormat::Secs, true),
            sent: eq.sent.to_rfc3339_opts(SecondsFormat::Secs, true),
        })
        .map_err(csv_error)?;
    writer.flush()?;

    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn quake() -> Earthquake {
        let date = Utc.with_ymd_and_hms(2015, 9, 12, 20, 32, 26).unwrap();
        Earthquake {
            event_id: "us2023abc".to_string(),
            lat: -32.6,
            lon: -178.0,
            depth: 8.0,
            magnitude: 5.9,
            date,
            sent: date,
        }
    }

    #[test]
    fn test_export_writes_once() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("new_events");

        let path = export_event(&out, &quake()).unwrap().unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("event_id,lat,lon,magnitude,depth,event_time,sent"));
        assert_eq!(
            lines.next(),
            Some("us2023abc,-32.6,-178.0,5.9,8.0,2015-09-12T20:32:26Z,2015-09-12T20:32:26Z")
        );

        assert!(export_event(&out, &quake()).unwrap().is_none());
    }

    #[test]
    fn test_export_path_sanitized() {
        let p = export_path(Path::new("out"), "../evil/id");
        assert_eq!(p, Path::new("out").join(".._evil_id.csv"));
    }
}
