//! Database initialization
//!
//! Opens (or creates) the SQLite database and creates the schema. Table
//! creation is idempotent, so startup always runs it.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Per-connection wait for a SQLite lock before `database is locked`
pub const BUSY_TIMEOUT_MS: u64 = 5000;

/// Catalogue tables, one per station network
pub const CATALOGUE_TABLES: [&str; 3] = ["llo_catalogues", "lho_catalogues", "virgo_catalogues"];

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options(db_path))
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Options applied to every pooled connection: foreign keys, WAL journal, busy timeout
pub fn connect_options(db_path: &Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))
}

/// Create every table (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_earthquakes_table(pool).await?;
    create_stations_table(pool).await?;
    create_predictions_table(pool).await?;
    for table in CATALOGUE_TABLES {
        create_catalogue_table(pool, table).await?;
    }
    Ok(())
}

/// Drop every table, dependents first
pub async fn drop_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DROP TABLE IF EXISTS predictions").execute(pool).await?;
    sqlx::query("DROP TABLE IF EXISTS earthquakes").execute(pool).await?;
    sqlx::query("DROP TABLE IF EXISTS stations").execute(pool).await?;
    for table in CATALOGUE_TABLES {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(pool)
            .await?;
    }
    info!("Dropped all seismon tables");
    Ok(())
}

pub async fn create_earthquakes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS earthquakes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT NOT NULL UNIQUE,
            lat REAL NOT NULL,
            lon REAL NOT NULL,
            depth REAL NOT NULL,
            magnitude REAL NOT NULL,
            date TEXT NOT NULL,
            sent TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            modified TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_earthquakes_magnitude ON earthquakes(magnitude)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_earthquakes_date ON earthquakes(date)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn create_stations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            lat REAL NOT NULL,
            lon REAL NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            modified TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_predictions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS predictions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT NOT NULL REFERENCES earthquakes(event_id),
            station TEXT NOT NULL REFERENCES stations(name),
            magnitude REAL NOT NULL,
            depth REAL NOT NULL,
            lat REAL NOT NULL,
            lon REAL NOT NULL,
            d REAL NOT NULL,
            p TEXT NOT NULL,
            s TEXT NOT NULL,
            r2p0 TEXT NOT NULL,
            r3p5 TEXT NOT NULL,
            r5p0 TEXT NOT NULL,
            rfamp REAL NOT NULL,
            rfamp_measured REAL NOT NULL DEFAULT -1,
            lockloss INTEGER NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            modified TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(event_id, station)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Catalogue table; `table` must be one of [`CATALOGUE_TABLES`]
pub async fn create_catalogue_table(pool: &SqlitePool, table: &str) -> Result<()> {
    let sql = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT NOT NULL,
            time TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            depth REAL NOT NULL,
            mag REAL NOT NULL,
            place TEXT NOT NULL,
            SNR REAL NOT NULL,
            peak_data_um_mean_subtracted REAL NOT NULL
        )
        "#,
        table
    );
    sqlx::query(&sql).execute(pool).await?;

    Ok(())
}
