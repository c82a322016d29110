//! Seismic phase arrival-time estimation
//!
//! Surface-wave arrivals come straight from fixed group velocities. Body-wave
//! (P, S) arrivals come from a [`TravelTimeTable`]; when the table cannot
//! answer for a depth/distance combination both P and S degrade to the
//! slowest (2.0 km/s) surface-wave arrival.

mod iasp91;

pub use iasp91::Iasp91Table;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::geodesy::km_to_degrees;
use seismon_common::time::seconds_to_duration;

/// Surface-wave group velocities (km/s): R2.0, R3.5, R5.0
pub const SURFACE_WAVE_VELOCITIES: [f64; 3] = [2.0, 3.5, 5.0];

/// Travel-time table failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("unsupported source depth {0} km")]
    UnsupportedDepth(f64),

    #[error("unsupported distance {0} deg")]
    UnsupportedDistance(f64),

    #[error("no {phase} phase at depth {depth_km} km, distance {distance_deg} deg")]
    MissingPhase {
        phase: char,
        depth_km: f64,
        distance_deg: f64,
    },

    #[error("{0}")]
    Other(String),
}

/// One phase arrival, seconds after origin
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseArrival {
    pub name: String,
    pub time_s: f64,
}

/// Source of body-wave arrivals
pub trait TravelTimeTable: Send + Sync {
    /// Model name for logging
    fn name(&self) -> &str;

    /// All phase arrivals for a source depth and epicentral distance, sorted by time
    fn arrivals(&self, depth_km: f64, distance_deg: f64) -> Result<Vec<PhaseArrival>, ModelError>;
}

/// Absolute arrival times at one station
#[derive(Debug, Clone, PartialEq)]
pub struct TravelTimes {
    pub distance_km: f64,
    pub p: DateTime<Utc>,
    pub s: DateTime<Utc>,
    pub r2p0: DateTime<Utc>,
    pub r3p5: DateTime<Utc>,
    pub r5p0: DateTime<Utc>,
    /// Body-wave times were replaced by the R2.0 arrival
    pub degraded: bool,
}

/// Arrival-time model over a travel-time table
#[derive(Clone)]
pub struct TravelTimeModel {
    table: Arc<dyn TravelTimeTable>,
}

impl TravelTimeModel {
    pub fn new(table: Arc<dyn TravelTimeTable>) -> Self {
        Self { table }
    }

    /// Model backed by the built-in IASP91 table
    pub fn iasp91() -> Self {
        Self::new(Arc::new(Iasp91Table::new()))
    }

    pub fn table_name(&self) -> &str {
        self.table.name()
    }

    /// Arrival times for a source at `depth_km`, `distance_km` from the station
    pub fn travel_times(&self, origin: DateTime<Utc>, distance_km: f64, depth_km: f64) -> TravelTimes {
        let [v_slow, v_mid, v_fast] = SURFACE_WAVE_VELOCITIES;
        let r2p0 = origin + seconds_to_duration(distance_km / v_slow);
        let r3p5 = origin + seconds_to_duration(distance_km / v_mid);
        let r5p0 = origin + seconds_to_duration(distance_km / v_fast);

        let distance_deg = km_to_degrees(distance_km);
        let (p, s, degraded) = match self.body_waves(depth_km, distance_deg) {
            Ok((p_s, s_s)) => (
                origin + seconds_to_duration(p_s),
                origin + seconds_to_duration(s_s),
                false,
            ),
            Err(e) => {
                warn!(
                    model = self.table.name(),
                    depth_km,
                    distance_deg,
                    error = %e,
                    "Travel-time lookup failed, using R2.0 arrival for P and S"
                );
                (r2p0, r2p0, true)
            }
        };

        TravelTimes {
            distance_km,
            p,
            s,
            r2p0,
            r3p5,
            r5p0,
            degraded,
        }
    }

    /// First-arriving P-type and S-type phases, seconds after origin
    fn body_waves(&self, depth_km: f64, distance_deg: f64) -> Result<(f64, f64), ModelError> {
        let arrivals = self.table.arrivals(depth_km, distance_deg)?;
        let first = |prefix: char| {
            arrivals
                .iter()
                .filter(|a| a.name.chars().next().map(|c| c.to_ascii_lowercase()) == Some(prefix))
                .map(|a| a.time_s)
                .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |m| m.min(t))))
                .ok_or(ModelError::MissingPhase {
                    phase: prefix,
                    depth_km,
                    distance_deg,
                })
        };
        Ok((first('p')?, first('s')?))
    }
}
