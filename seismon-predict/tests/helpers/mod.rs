//! Shared fixtures for seismon-predict integration tests
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use sqlx::SqlitePool;
use tempfile::TempDir;

use seismon_common::db::{init_database, Earthquake};
use seismon_common::Config;
use seismon_predict::db::stations::seed_stations;
use seismon_predict::PredictionContext;

pub const CATALOGUE_HEADER: &str =
    "event_id,time,latitude,longitude,depth,mag,place,SNR,peak_data_um_mean_subtracted";

/// Temporary working directory with a fresh database and matching config
pub struct TestEnv {
    pub dir: TempDir,
    pub pool: SqlitePool,
    pub config: Config,
}

impl TestEnv {
    pub async fn new() -> Self {
        Self::with_settings("").await
    }

    /// `extra` may add `[prediction]` or `[scheduler]` sections
    pub async fn with_settings(extra: &str) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let root = dir.path();
        let toml = format!(
            r#"
[database]
path = '{db}'
catalogue_timeout_ms = 2000

[pdl]
directory = '{pdl}'

[catalogue]
directory = '{input}'

[export]
directory = '{export}'

{extra}
"#,
            db = root.join("seismon.db").display(),
            pdl = root.join("pdl").display(),
            input = root.join("input").display(),
            export = root.join("new_events").display(),
            extra = extra,
        );
        let config = Config::from_toml_str(&toml).expect("test config");
        std::fs::create_dir_all(&config.pdl.directory).expect("pdl dir");
        std::fs::create_dir_all(&config.catalogue.directory).expect("input dir");

        let pool = init_database(&config.database.path).await.expect("database");
        seed_stations(&pool).await.expect("stations");

        Self { dir, pool, config }
    }

    pub fn context(&self) -> PredictionContext {
        PredictionContext::new(self.pool.clone(), self.config.clone())
    }

    pub fn pdl_dir(&self) -> &Path {
        &self.config.pdl.directory
    }

    pub fn catalogue_dir(&self) -> &Path {
        &self.config.catalogue.directory
    }

    pub fn export_dir(&self) -> PathBuf {
        self.config
            .export
            .directory
            .clone()
            .expect("export directory configured")
    }
}

/// Write `<pdl>/<event>/<event[..2]>/<version>/notice.json`, returns the version folder
pub fn write_notice(pdl: &Path, event: &str, version: &str, body: &str) -> PathBuf {
    let prefix: String = event.chars().take(2).collect();
    let folder = pdl.join(event).join(prefix).join(version);
    std::fs::create_dir_all(&folder).expect("notice folder");
    std::fs::write(folder.join("notice.json"), body).expect("notice file");
    folder
}

pub fn notice_json(event: &str, time: DateTime<Utc>, lat: f64, lon: f64, depth: f64, magnitude: f64) -> String {
    serde_json::json!({
        "eventName": event,
        "Time": time.to_rfc3339(),
        "Latitude": lat,
        "Longitude": lon,
        "Depth": depth,
        "Magnitude": magnitude,
    })
    .to_string()
}

/// Write `<dir>/<CODE>_processed_USGS_global_EQ_catalogue.csv`
///
/// Rows are (latitude, longitude, magnitude, peak µm/s).
pub fn write_catalogue(dir: &Path, code: &str, rows: &[(f64, f64, f64, f64)]) -> PathBuf {
    let path = dir.join(format!("{}_processed_USGS_global_EQ_catalogue.csv", code));
    let mut content = String::from(CATALOGUE_HEADER);
    content.push('\n');
    for (i, (lat, lon, mag, peak)) in rows.iter().enumerate() {
        content.push_str(&format!(
            "{code}{i},2014-01-01T00:00:00Z,{lat},{lon},10.0,{mag},\"Somewhere, Earth\",10.0,{peak}\n"
        ));
    }
    std::fs::write(&path, content).expect("catalogue file");
    path
}

/// M5.9 Kermadec event used across the end-to-end tests
pub fn kermadec() -> Earthquake {
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
