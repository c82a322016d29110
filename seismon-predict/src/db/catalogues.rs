//! Catalogue table access
//!
//! Table names come from `NetworkProfile::catalogue_table`, never from input.

use sqlx::{Row, SqlitePool};

use crate::error::PredictResult;
use crate::network::NetworkProfile;
use seismon_common::db::CatalogueEntry;

pub async fn read_catalogue(pool: &SqlitePool, network: NetworkProfile) -> PredictResult<Vec<CatalogueEntry>> {
    let sql = format!(
        "SELECT event_id, time, latitude, longitude, depth, mag, place, SNR, peak_data_um_mean_subtracted \
         FROM {} ORDER BY id",
        network.catalogue_table()
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;

    Ok(rows
        .iter()
        .map(|row| CatalogueEntry {
            event_id: row.get("event_id"),
            time: row.get("time"),
            latitude: row.get("latitude"),
            longitude: row.get("longitude"),
            depth: row.get("depth"),
            mag: row.get("mag"),
            place: row.get("place"),
            snr: row.get("SNR"),
            peak_amplitude_um: row.get("peak_data_um_mean_subtracted"),
        })
        .collect())
}

pub async fn count_catalogue(pool: &SqlitePool, network: NetworkProfile) -> PredictResult<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", network.catalogue_table());
    let count: i64 = sqlx::query_scalar(&sql).fetch_one(pool).await?;
    Ok(count)
}

/// Append entries in one transaction, returns the number inserted
pub async fn insert_catalogue(
    pool: &SqlitePool,
    network: NetworkProfile,
    entries: &[CatalogueEntry],
) -> PredictResult<usize> {
    let sql = format!(
        "INSERT INTO {} (event_id, time, latitude, longitude, depth, mag, place, SNR, peak_data_um_mean_subtracted) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        network.catalogue_table()
    );

    let mut tx = pool.begin().await?;
    for entry in entries {
        sqlx::query(&sql)
            .bind(&entry.event_id)
            .bind(&entry.time)
            .bind(entry.latitude)
            .bind(entry.longitude)
            .bind(entry.depth)
            .bind(entry.mag)
            .bind(&entry.place)
            .bind(entry.snr)
            .bind(entry.peak_amplitude_um)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    Ok(entries.len())
}

