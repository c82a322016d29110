//! Earthquake notice ingestion
//!
//! The notice client writes one folder per event:
//! `<dir>/<event>/<first two chars of event>/<version>/`. Each version folder
//! holds the notice file and, once handled, a marker file. A folder is marked
//! only after its notice was stored, rejected as malformed or found too old;
//! a database failure leaves it unmarked so the next poll reads it again.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::db::earthquakes;
use crate::error::{PredictError, PredictResult};
use crate::geodesy::validate_coordinate;
use crate::utils::retry_on_lock;
use seismon_common::db::Earthquake;
use seismon_common::time::parse_utc;

/// Marker written into a version folder once it has been seen
pub const MARKER_FILE: &str = "eqxml.txt";
const MARKER_CONTENT: &str = "Done";

/// Attribute record read from one notice
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoticeRecord {
    pub event_name: Option<String>,
    pub time: Option<String>,
    pub sent: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub depth: Option<f64>,
    pub magnitude: Option<f64>,
}

/// Notice file format
pub trait NoticeParser: Send + Sync {
    /// Notice file name inside a version folder
    fn file_name(&self) -> &str;

    fn parse(&self, path: &Path) -> PredictResult<NoticeRecord>;
}

/// JSON attribute record: `eventName`, `Time`, `Sent`, `Latitude`,
/// `Longitude`, `Depth`, `Magnitude`. Numbers may be given as strings.
#[derive(Debug, Clone, Default)]
pub struct JsonNoticeParser;

impl NoticeParser for JsonNoticeParser {
    fn file_name(&self) -> &str {
        "notice.json"
    }

    fn parse(&self, path: &Path) -> PredictResult<NoticeRecord> {
        let malformed = |reason: String| PredictError::MalformedNotice {
            path: path.to_path_buf(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| malformed(e.to_string()))?;
        let value: Value = serde_json::from_str(&content).map_err(|e| malformed(e.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| malformed("notice is not a JSON object".to_string()))?;

        let text = |key: &str| match object.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        };
        let number = |key: &str| -> PredictResult<Option<f64>> {
            match object.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::Number(n)) => Ok(n.as_f64()),
                Some(Value::String(s)) => s
                    .trim()
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| malformed(format!("{} is not a number: {:?}", key, s))),
                Some(other) => Err(malformed(format!("{} is not a number: {}", key, other))),
            }
        };

        Ok(NoticeRecord {
            event_name: text("eventName"),
            time: text("Time"),
            sent: text("Sent"),
            latitude: number("Latitude")?,
            longitude: number("Longitude")?,
            depth: number("Depth")?,
            magnitude: number("Magnitude")?,
        })
    }
}

/// What happened to each version folder during a scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Version folders visited
    pub scanned: usize,
    /// Already marked and skipped
    pub already_seen: usize,
    /// No notice file in the folder
    pub no_notice: usize,
    /// Unparsable notice or missing required fields
    pub malformed: usize,
    /// Origin time outside the lookback window
    pub too_old: usize,
    /// New earthquakes stored
    pub ingested: usize,
    /// Known earthquakes re-merged
    pub updated: usize,
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Ignore markers and re-read every notice
    pub repeat: bool,
    pub lookback: Duration,
    pub now: DateTime<Utc>,
}

/// Notice to earthquake conversion; `fallback_id` is the event folder name
pub fn earthquake_from_notice(record: &NoticeRecord, fallback_id: &str, path: &Path) -> PredictResult<Earthquake> {
    let malformed = |reason: &str| PredictError::MalformedNotice {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let (lat, lon) = match (record.latitude, record.longitude) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return Err(malformed("missing position")),
    };
    validate_coordinate(lat, lon).map_err(|e| malformed(&e.to_string()))?;
    let magnitude = record.magnitude.ok_or_else(|| malformed("missing magnitude"))?;
    if !magnitude.is_finite() {
        return Err(malformed(&format!("magnitude {}", magnitude)));
    }
    let depth = record.depth.ok_or_else(|| malformed("missing depth"))?;
    if !depth.is_finite() || depth < 0.0 {
        return Err(malformed(&format!("depth {}", depth)));
    }
    let time = record.time.as_deref().ok_or_else(|| malformed("missing origin time"))?;
    let date = parse_utc(time).map_err(|e| malformed(&e.to_string()))?;
    // Notices without a sent time use the origin time
    let sent = match record.sent.as_deref() {
        Some(s) => parse_utc(s).unwrap_or(date),
        None => date,
    };

    Ok(Earthquake {
        event_id: record
            .event_name
            .clone()
            .unwrap_or_else(|| fallback_id.to_string()),
        lat,
        lon,
        depth,
        magnitude,
        date,
        sent,
    })
}

/// Scans the notice directory and stores new earthquakes
pub struct NoticeIngestor {
    pool: SqlitePool,
    parser: Box<dyn NoticeParser>,
    max_lock_wait_ms: u64,
}

impl NoticeIngestor {
    pub fn new(pool: SqlitePool, max_lock_wait_ms: u64) -> Self {
        Self::with_parser(pool, Box::new(JsonNoticeParser), max_lock_wait_ms)
    }

    pub fn with_parser(pool: SqlitePool, parser: Box<dyn NoticeParser>, max_lock_wait_ms: u64) -> Self {
        Self {
            pool,
            parser,
            max_lock_wait_ms,
        }
    }

    /// Ingest every unseen notice under `directory`
    ///
    /// Per-notice problems are logged and counted; only database failures abort the scan.
    pub async fn ingest(&self, directory: &Path, options: &IngestOptions) -> PredictResult<IngestStats> {
        let mut stats = IngestStats::default();

        for (event_name, version) in version_folders(directory) {
            stats.scanned += 1;
            let marker = version.join(MARKER_FILE);

            if !options.repeat && marker.is_file() {
                stats.already_seen += 1;
                continue;
            }

            let notice = version.join(self.parser.file_name());
            if !notice.is_file() {
                // The notice may still be arriving; look again next poll
                stats.no_notice += 1;
                continue;
            }

            let eq = match self
                .parser
                .parse(&notice)
                .and_then(|record| earthquake_from_notice(&record, &event_name, &notice))
            {
                Ok(eq) => eq,
                Err(e) => {
                    warn!(error = %e, "Skipping notice");
                    stats.malformed += 1;
                    mark_seen(&marker);
                    continue;
                }
            };

            if options.now - eq.date > options.lookback {
                debug!(event_id = %eq.event_id, date = %eq.date, "Notice outside lookback window");
                stats.too_old += 1;
                mark_seen(&marker);
                continue;
            }

            let known = earthquakes::earthquake_exists(&self.pool, &eq.event_id).await?;
            let pool = &self.pool;
            let quake = &eq;
            retry_on_lock("earthquake upsert", self.max_lock_wait_ms, || {
                earthquakes::upsert_earthquake(pool, quake)
            })
            .await?;
            mark_seen(&marker);

            if known {
                debug!(event_id = %eq.event_id, "Earthquake re-merged");
                stats.updated += 1;
            } else {
                info!(
                    event_id = %eq.event_id,
                    magnitude = eq.magnitude,
                    lat = eq.lat,
                    lon = eq.lon,
                    depth = eq.depth,
                    date = %eq.date,
                    "Ingested event"
                );
                stats.ingested += 1;
            }
        }

        Ok(stats)
    }
}

fn mark_seen(marker: &Path) {
    if let Err(e) = std::fs::write(marker, MARKER_CONTENT) {
        warn!(marker = %marker.display(), error = %e, "Could not write notice marker");
    }
}

/// (event name, version folder) pairs in sorted order
fn version_folders(directory: &Path) -> Vec<(String, PathBuf)> {
    let mut folders = Vec::new();

    for event_dir in subdirectories(directory) {
        let Some(event_name) = event_dir.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        let prefix: String = event_name.chars().take(2).collect();
        for version in subdirectories(&event_dir.join(prefix)) {
            folders.push((event_name.clone(), version));
        }
    }

    folders
}

fn subdirectories(directory: &Path) -> Vec<PathBuf> {
    WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_notice(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("notice.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_parse_full_notice() {
        let dir = TempDir::new().unwrap();
        let path = write_notice(
            dir.path(),
            r#"{"eventName": "us2023abc", "Time": "2015-09-12T20:32:26Z", "Sent": "2015-09-12T20:40:00Z",
                "Latitude": -32.6, "Longitude": "-178.0", "Depth": 8, "Magnitude": 5.9}"#,
        );

        let record = JsonNoticeParser.parse(&path).unwrap();
        assert_eq!(record.event_name.as_deref(), Some("us2023abc"));
        assert_eq!(record.longitude, Some(-178.0));
        assert_eq!(record.depth, Some(8.0));

        let eq = earthquake_from_notice(&record, "folder", &path).unwrap();
        assert_eq!(eq.event_id, "us2023abc");
        assert_eq!((eq.sent - eq.date).num_seconds(), 454);
    }

    #[test]
    fn test_missing_sent_uses_origin_time() {
        let record = NoticeRecord {
            time: Some("2015-09-12T20:32:26Z".to_string()),
            latitude: Some(1.0),
            longitude: Some(2.0),
            depth: Some(10.0),
            magnitude: Some(6.0),
            ..NoticeRecord::default()
        };
        let eq = earthquake_from_notice(&record, "us1", Path::new("n.json")).unwrap();
        assert_eq!(eq.sent, eq.date);
        assert_eq!(eq.event_id, "us1");
    }

    #[test]
    fn test_missing_position_or_magnitude_rejected() {
        let base = NoticeRecord {
            time: Some("2015-09-12T20:32:26Z".to_string()),
            latitude: Some(1.0),
            longitude: Some(2.0),
            depth: Some(10.0),
            magnitude: Some(6.0),
            ..NoticeRecord::default()
        };
        let no_lat = NoticeRecord { latitude: None, ..base.clone() };
        let no_mag = NoticeRecord { magnitude: None, ..base };
        for record in [no_lat, no_mag] {
            assert!(matches!(
                earthquake_from_notice(&record, "x", Path::new("n.json")),
                Err(PredictError::MalformedNotice { .. })
            ));
        }
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let base = NoticeRecord {
            time: Some("2015-09-12T20:32:26Z".to_string()),
            latitude: Some(1.0),
            longitude: Some(2.0),
            depth: Some(10.0),
            magnitude: Some(6.0),
            ..NoticeRecord::default()
        };
        let bad = [
            NoticeRecord { latitude: Some(95.0), ..base.clone() },
            NoticeRecord { latitude: Some(f64::INFINITY), ..base.clone() },
            NoticeRecord { longitude: Some(f64::NAN), ..base.clone() },
            NoticeRecord { longitude: Some(400.0), ..base.clone() },
            NoticeRecord { depth: Some(-5.0), ..base.clone() },
            NoticeRecord { depth: Some(f64::NAN), ..base.clone() },
            NoticeRecord { magnitude: Some(f64::INFINITY), ..base.clone() },
        ];
        for record in bad {
            assert!(
                matches!(
                    earthquake_from_notice(&record, "x", Path::new("n.json")),
                    Err(PredictError::MalformedNotice { .. })
                ),
                "accepted {:?}",
                record
            );
        }
        assert!(earthquake_from_notice(&base, "x", Path::new("n.json")).is_ok());
    }

    #[test]
    fn test_non_finite_strings_rejected() {
        let dir = TempDir::new().unwrap();
        for value in ["NaN", "inf"] {
            let path = write_notice(
                dir.path(),
                &format!(
                    r#"{{"Time": "2015-09-12T20:32:26Z", "Latitude": "{}", "Longitude": 2.0, "Depth": 10, "Magnitude": 6.0}}"#,
                    value
                ),
            );
            let record = JsonNoticeParser.parse(&path).unwrap();
            assert!(earthquake_from_notice(&record, "x", &path).is_err());
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = write_notice(dir.path(), "<quakeml/>");
        assert!(matches!(
            JsonNoticeParser.parse(&path),
            Err(PredictError::MalformedNotice { .. })
        ));

        let path = write_notice(dir.path(), r#"{"Magnitude": "big"}"#);
        assert!(JsonNoticeParser.parse(&path).is_err());
    }

    #[test]
    fn test_version_folders_sorted() {
        let dir = TempDir::new().unwrap();
        for v in ["1442090000000", "1442089999000"] {
            std::fs::create_dir_all(dir.path().join("us2023abc").join("us").join(v)).unwrap();
        }
        // Folder without the prefix subfolder contributes nothing
        std::fs::create_dir_all(dir.path().join("ak0001").join("xx")).unwrap();

        let folders = version_folders(dir.path());
        assert_eq!(folders.len(), 2);
        assert!(folders[0].1.ends_with("1442089999000"));
        assert_eq!(folders[1].0, "us2023abc");
    }
}
