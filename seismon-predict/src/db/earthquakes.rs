//! Earthquake persistence

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use super::format_timestamp;
use crate::error::PredictResult;
use seismon_common::db::Earthquake;
use seismon_common::time::parse_utc;

/// Insert or overwrite an earthquake keyed by `event_id`
pub async fn upsert_earthquake(pool: &SqlitePool, eq: &Earthquake) -> PredictResult<()> {
    sqlx::query(
        r#"
        INSERT INTO earthquakes (event_id, lat, lon, depth, magnitude, date, sent)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(event_id) DO UPDATE SET
            lat = excluded.lat,
            lon = excluded.lon,
            depth = excluded.depth,
            magnitude = excluded.magnitude,
            date = excluded.date,
            sent = excluded.sent,
            modified = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&eq.event_id)
    .bind(eq.lat)
    .bind(eq.lon)
    .bind(eq.depth)
    .bind(eq.magnitude)
    .bind(format_timestamp(&eq.date))
    .bind(format_timestamp(&eq.sent))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn earthquake_exists(pool: &SqlitePool, event_id: &str) -> PredictResult<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM earthquakes WHERE event_id = ?")
        .bind(event_id)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

pub async fn load_earthquake(pool: &SqlitePool, event_id: &str) -> PredictResult<Option<Earthquake>> {
    let row = sqlx::query(
        "SELECT event_id, lat, lon, depth, magnitude, date, sent FROM earthquakes WHERE event_id = ?",
    )
    .bind(event_id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| earthquake_from_row(&r)).transpose()
}

/// All earthquakes, oldest origin time first
pub async fn query_earthquakes(pool: &SqlitePool) -> PredictResult<Vec<Earthquake>> {
    let rows = sqlx::query(
        "SELECT event_id, lat, lon, depth, magnitude, date, sent FROM earthquakes ORDER BY date, event_id",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(earthquake_from_row).collect()
}

/// Earthquakes at or above `min_magnitude`, oldest origin time first
pub async fn query_earthquakes_min_magnitude(
    pool: &SqlitePool,
    min_magnitude: f64,
) -> PredictResult<Vec<Earthquake>> {
    let rows = sqlx::query(
        r#"
        SELECT event_id, lat, lon, depth, magnitude, date, sent
        FROM earthquakes
        WHERE magnitude >= ?
        ORDER BY date, event_id
        "#,
    )
    .bind(min_magnitude)
    .fetch_all(pool)
    .await?;

    rows.iter().map(earthquake_from_row).collect()
}

fn earthquake_from_row(row: &SqliteRow) -> PredictResult<Earthquake> {
    let date: String = row.get("date");
    let sent: String = row.get("sent");
    Ok(Earthquake {
        event_id: row.get("event_id"),
        lat: row.get("lat"),
        lon: row.get("lon"),
        depth: row.get("depth"),
        magnitude: row.get("magnitude"),
        date: parse_utc(&date)?,
        sent: parse_utc(&sent)?,
    })
}
