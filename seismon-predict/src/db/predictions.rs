//! Prediction persistence
//!
//! One row per (event_id, station). Recomputing a pair overwrites the
//! predicted fields but leaves `rfamp_measured` alone, since that column is
//! owned by whoever records the observed amplitude.

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use super::format_timestamp;
use crate::error::PredictResult;
use seismon_common::db::Prediction;
use seismon_common::time::parse_utc;

const SELECT_COLUMNS: &str = "event_id, station, magnitude, depth, lat, lon, d, p, s, r2p0, r3p5, r5p0, \
                              rfamp, rfamp_measured, lockloss";

pub async fn upsert_prediction(pool: &SqlitePool, prediction: &Prediction) -> PredictResult<()> {
    sqlx::query(
        r#"
        INSERT INTO predictions (
            event_id, station, magnitude, depth, lat, lon, d,
            p, s, r2p0, r3p5, r5p0, rfamp, rfamp_measured, lockloss
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(event_id, station) DO UPDATE SET
            magnitude = excluded.magnitude,
            depth = excluded.depth,
            lat = excluded.lat,
            lon = excluded.lon,
            d = excluded.d,
            p = excluded.p,
            s = excluded.s,
            r2p0 = excluded.r2p0,
            r3p5 = excluded.r3p5,
            r5p0 = excluded.r5p0,
            rfamp = excluded.rfamp,
            lockloss = excluded.lockloss,
            modified = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&prediction.event_id)
    .bind(&prediction.station)
    .bind(prediction.magnitude)
    .bind(prediction.depth)
    .bind(prediction.lat)
    .bind(prediction.lon)
    .bind(prediction.distance_km)
    .bind(format_timestamp(&prediction.p_time))
    .bind(format_timestamp(&prediction.s_time))
    .bind(format_timestamp(&prediction.r2p0_time))
    .bind(format_timestamp(&prediction.r3p5_time))
    .bind(format_timestamp(&prediction.r5p0_time))
    .bind(prediction.rfamp)
    .bind(prediction.rfamp_measured)
    .bind(prediction.lockloss)
    .execute(pool)
    .await?;

    Ok(())
}

/// Zero or one prediction for a pair
pub async fn query_prediction(
    pool: &SqlitePool,
    event_id: &str,
    station: &str,
) -> PredictResult<Option<Prediction>> {
    let sql = format!(
        "SELECT {} FROM predictions WHERE event_id = ? AND station = ?",
        SELECT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(event_id)
        .bind(station)
        .fetch_optional(pool)
        .await?;

    row.map(|r| prediction_from_row(&r)).transpose()
}

pub async fn prediction_exists(pool: &SqlitePool, event_id: &str, station: &str) -> PredictResult<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM predictions WHERE event_id = ? AND station = ?")
            .bind(event_id)
            .bind(station)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

/// Predictions for one event, ordered by station
pub async fn query_predictions_for_event(pool: &SqlitePool, event_id: &str) -> PredictResult<Vec<Prediction>> {
    let sql = format!(
        "SELECT {} FROM predictions WHERE event_id = ? ORDER BY station",
        SELECT_COLUMNS
    );
    let rows = sqlx::query(&sql).bind(event_id).fetch_all(pool).await?;

    rows.iter().map(prediction_from_row).collect()
}

pub async fn count_predictions(pool: &SqlitePool) -> PredictResult<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM predictions")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Record the observed peak amplitude (m/s) for a pair
///
/// Returns `false` when no prediction exists for the pair.
pub async fn update_measured_amplitude(
    pool: &SqlitePool,
    event_id: &str,
    station: &str,
    measured: f64,
) -> PredictResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE predictions
        SET rfamp_measured = ?, modified = CURRENT_TIMESTAMP
        WHERE event_id = ? AND station = ?
        "#,
    )
    .bind(measured)
    .bind(event_id)
    .bind(station)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

fn prediction_from_row(row: &SqliteRow) -> PredictResult<Prediction> {
    let time = |column: &str| -> PredictResult<_> {
        let value: String = row.get(column);
        Ok(parse_utc(&value)?)
    };

    Ok(Prediction {
        event_id: row.get("event_id"),
        station: row.get("station"),
        magnitude: row.get("magnitude"),
        depth: row.get("depth"),
        lat: row.get("lat"),
        lon: row.get("lon"),
        distance_km: row.get("d"),
        p_time: time("p")?,
        s_time: time("s")?,
        r2p0_time: time("r2p0")?,
        r3p5_time: time("r3p5")?,
        r5p0_time: time("r5p0")?,
        rfamp: row.get("rfamp"),
        rfamp_measured: row.get("rfamp_measured"),
        lockloss: row.get("lockloss"),
    })
}
