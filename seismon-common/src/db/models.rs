//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel stored in `predictions.rfamp_measured` until an observation arrives
pub const MEASURED_AMPLITUDE_UNSET: f64 = -1.0;

/// Earthquake ingested from a notice; `event_id` is the dedup key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Earthquake {
    pub event_id: String,
    pub lat: f64,
    pub lon: f64,
    /// Depth below surface in km
    pub depth: f64,
    pub magnitude: f64,
    /// Origin time
    pub date: DateTime<Utc>,
    /// Notice sent time (origin time when the notice omits it)
    pub sent: DateTime<Utc>,
}

/// Monitored site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// Arrival-time and amplitude prediction for one (earthquake, station) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub event_id: String,
    pub station: String,
    pub magnitude: f64,
    pub depth: f64,
    pub lat: f64,
    pub lon: f64,
    /// Epicentral distance in km
    pub distance_km: f64,
    pub p_time: DateTime<Utc>,
    pub s_time: DateTime<Utc>,
    /// Surface-wave arrival at 2.0 km/s group velocity
    pub r2p0_time: DateTime<Utc>,
    /// Surface-wave arrival at 3.5 km/s group velocity
    pub r3p5_time: DateTime<Utc>,
    /// Surface-wave arrival at 5.0 km/s group velocity
    pub r5p0_time: DateTime<Utc>,
    /// Predicted peak ground velocity in m/s (-1 when no prediction was possible)
    pub rfamp: f64,
    /// Measured peak ground velocity in m/s, [`MEASURED_AMPLITUDE_UNSET`] until observed
    pub rfamp_measured: f64,
    pub lockloss: bool,
}

/// Historical labeled event from a station network's catalogue
///
/// Field names follow the catalogue tables and CSV headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogueEntry {
    pub event_id: String,
    pub time: String,
    pub latitude: f64,
    pub longitude: f64,
    pub depth: f64,
    pub mag: f64,
    pub place: String,
    #[serde(rename = "SNR")]
    pub snr: f64,
    /// Observed peak ground velocity in µm/s
    #[serde(rename = "peak_data_um_mean_subtracted")]
    pub peak_amplitude_um: f64,
}
