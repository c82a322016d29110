//! Station persistence

use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::PredictResult;
use crate::network::station_registry;
use seismon_common::db::Station;

pub async fn upsert_station(pool: &SqlitePool, station: &Station) -> PredictResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stations (name, lat, lon)
        VALUES (?, ?, ?)
        ON CONFLICT(name) DO UPDATE SET
            lat = excluded.lat,
            lon = excluded.lon,
            modified = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&station.name)
    .bind(station.lat)
    .bind(station.lon)
    .execute(pool)
    .await?;

    Ok(())
}

/// Upsert every station of the fixed registry, returns how many were written
pub async fn seed_stations(pool: &SqlitePool) -> PredictResult<usize> {
    let stations = station_registry();
    for station in &stations {
        upsert_station(pool, station).await?;
        debug!(station = %station.name, lat = station.lat, lon = station.lon, "Station registered");
    }
    Ok(stations.len())
}

/// All stations ordered by name
pub async fn query_stations(pool: &SqlitePool) -> PredictResult<Vec<Station>> {
    let rows = sqlx::query("SELECT name, lat, lon FROM stations ORDER BY name")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| Station {
            name: row.get("name"),
            lat: row.get("lat"),
            lon: row.get("lon"),
        })
        .collect())
}
