//! Per-pair prediction: distance, arrival times and amplitude for one
//! (earthquake, station) pair, persisted as a single upsert.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::amplitude::{AmplitudePrediction, AmplitudePredictor};
use crate::catalogue::{CatalogueSource, CatalogueStore};
use crate::db::predictions;
use crate::error::PredictResult;
use crate::geodesy::distance_and_azimuth;
use crate::network::MonitoredStation;
use crate::traveltime::TravelTimeModel;
use crate::utils::retry_on_lock;
use seismon_common::db::{Earthquake, Prediction, MEASURED_AMPLITUDE_UNSET};

/// Prediction with the intermediate results that produced it
#[derive(Debug, Clone)]
pub struct PredictionReport {
    pub prediction: Prediction,
    pub amplitude: AmplitudePrediction,
    pub catalogue_source: CatalogueSource,
    pub forward_azimuth: f64,
    pub back_azimuth: f64,
    /// Body-wave times fell back to the R2.0 arrival
    pub degraded_travel_times: bool,
}

#[derive(Clone)]
pub struct PredictionEngine {
    pool: SqlitePool,
    travel_times: TravelTimeModel,
    catalogues: CatalogueStore,
    amplitudes: AmplitudePredictor,
    max_lock_wait_ms: u64,
}

impl PredictionEngine {
    pub fn new(
        pool: SqlitePool,
        travel_times: TravelTimeModel,
        catalogues: CatalogueStore,
        amplitudes: AmplitudePredictor,
        max_lock_wait_ms: u64,
    ) -> Self {
        Self {
            pool,
            travel_times,
            catalogues,
            amplitudes,
            max_lock_wait_ms,
        }
    }

    pub fn catalogues(&self) -> &CatalogueStore {
        &self.catalogues
    }

    /// Compute the pair without touching the prediction table
    pub async fn evaluate(&self, eq: &Earthquake, station: &MonitoredStation) -> PredictResult<PredictionReport> {
        let site = &station.station;
        let geodesic = distance_and_azimuth(eq.lat, eq.lon, site.lat, site.lon)?;
        let times = self
            .travel_times
            .travel_times(eq.date, geodesic.distance_km, eq.depth);

        let catalogue = self.catalogues.load(station.network).await;
        let amplitude = self
            .amplitudes
            .predict(&catalogue.entries, eq.lat, eq.lon, eq.magnitude);

        debug!(
            event_id = %eq.event_id,
            station = %site.name,
            network = %station.network,
            distance_km = geodesic.distance_km,
            outcome = %amplitude.diagnostics.outcome,
            window_degrees = amplitude.diagnostics.window_degrees,
            neighbors = amplitude.diagnostics.neighbors_used,
            "Amplitude estimate"
        );

        let prediction = Prediction {
            event_id: eq.event_id.clone(),
            station: site.name.clone(),
            magnitude: eq.magnitude,
            depth: eq.depth,
            lat: eq.lat,
            lon: eq.lon,
            distance_km: times.distance_km,
            p_time: times.p,
            s_time: times.s,
            r2p0_time: times.r2p0,
            r3p5_time: times.r3p5,
            r5p0_time: times.r5p0,
            rfamp: amplitude.amplitude,
            rfamp_measured: MEASURED_AMPLITUDE_UNSET,
            lockloss: amplitude.lockloss,
        };

        Ok(PredictionReport {
            prediction,
            amplitude,
            catalogue_source: catalogue.source,
            forward_azimuth: geodesic.forward_azimuth,
            back_azimuth: geodesic.back_azimuth,
            degraded_travel_times: times.degraded,
        })
    }

    /// Compute the pair and upsert its prediction
    pub async fn compute(&self, eq: &Earthquake, station: &MonitoredStation) -> PredictResult<PredictionReport> {
        let report = self.evaluate(eq, station).await?;

        let pool = &self.pool;
        let prediction = &report.prediction;
        retry_on_lock("prediction upsert", self.max_lock_wait_ms, || {
            predictions::upsert_prediction(pool, prediction)
        })
        .await?;

        info!(
            event_id = %prediction.event_id,
            magnitude = prediction.magnitude,
            station = %prediction.station,
            distance_km = %format!("{:.1}", prediction.distance_km),
            rfamp = prediction.rfamp,
            lockloss = prediction.lockloss,
            degraded = report.degraded_travel_times,
            "Prediction stored"
        );

        Ok(report)
    }
}
