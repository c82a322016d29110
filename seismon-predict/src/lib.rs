//! seismon-predict library interface
//!
//! Earthquake early-warning predictions for monitored sites: arrival times
//! of seismic phases and peak ground velocity, computed for every new
//! earthquake notice and stored per (earthquake, station).

pub mod amplitude;
pub mod catalogue;
pub mod db;
pub mod engine;
pub mod error;
pub mod export;
pub mod geodesy;
pub mod ingest;
pub mod network;
pub mod purge;
pub mod scheduler;
pub mod traveltime;
pub mod utils;

pub use crate::error::{PredictError, PredictResult};

use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

use crate::amplitude::{AmplitudeParams, AmplitudePredictor};
use crate::catalogue::CatalogueStore;
use crate::engine::PredictionEngine;
use crate::traveltime::TravelTimeModel;
use seismon_common::Config;

/// Everything a prediction cycle needs, passed explicitly
#[derive(Clone)]
pub struct PredictionContext {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub engine: PredictionEngine,
}

impl PredictionContext {
    /// Context with the built-in IASP91 travel-time table
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        Self::with_travel_times(pool, config, TravelTimeModel::iasp91())
    }

    pub fn with_travel_times(pool: SqlitePool, config: Config, travel_times: TravelTimeModel) -> Self {
        let catalogues = CatalogueStore::new(
            pool.clone(),
            config.catalogue.directory.clone(),
            Duration::from_millis(config.database.catalogue_timeout_ms),
        );
        let amplitudes = AmplitudePredictor::new(AmplitudeParams::from(&config.prediction));
        let engine = PredictionEngine::new(
            pool.clone(),
            travel_times,
            catalogues,
            amplitudes,
            config.database.max_lock_wait_ms,
        );

        Self {
            pool,
            config: Arc::new(config),
            engine,
        }
    }
}
