//! Peak ground velocity prediction from historical catalogue events
//!
//! Catalogue events inside a lat/lon window around the epicenter are ranked
//! by a combined geographic and magnitude distance; the k nearest give an
//! inverse-distance weighted estimate of the peak amplitude at the station.
//! An empty window is widened by doubling up to a ceiling.

use std::fmt;

use seismon_common::config::PredictionConfig;
use seismon_common::db::CatalogueEntry;

/// Catalogue amplitudes are in µm/s, predictions in m/s
const MICRONS_TO_METERS: f64 = 1e-6;

/// Keeps an exact catalogue match from getting infinite weight
const DISTANCE_EPSILON: f64 = 1e-6;

/// Amplitude returned when no prediction is possible
pub const NO_PREDICTION: f64 = -1.0;

/// Predictor settings, taken from the `[prediction]` config section
#[derive(Debug, Clone, PartialEq)]
pub struct AmplitudeParams {
    pub geo_threshold_degrees: f64,
    pub max_geo_threshold_degrees: f64,
    pub lockloss_threshold: f64,
    pub neighbors: usize,
    pub magnitude_scale: f64,
}

impl From<&PredictionConfig> for AmplitudeParams {
    fn from(config: &PredictionConfig) -> Self {
        Self {
            geo_threshold_degrees: config.geo_threshold_degrees,
            max_geo_threshold_degrees: config.max_geo_threshold_degrees,
            lockloss_threshold: config.lockloss_amplitude_threshold,
            neighbors: config.neighbors,
            magnitude_scale: config.magnitude_scale,
        }
    }
}

impl Default for AmplitudeParams {
    fn default() -> Self {
        (&PredictionConfig::default()).into()
    }
}

/// How the prediction was reached
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Neighbors found in the window
    Neighbors,
    /// No catalogue event inside the widest window
    NoNeighbors,
    /// Catalogue had no rows at all
    EmptyCatalogue,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Neighbors => f.write_str("neighbors"),
            Outcome::NoNeighbors => f.write_str("no_neighbors"),
            Outcome::EmptyCatalogue => f.write_str("empty_catalogue"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub outcome: Outcome,
    /// Window half-width (degrees) the neighbors were found in, or the last one tried
    pub window_degrees: f64,
    /// Catalogue events inside the window
    pub candidates: usize,
    /// Events used in the estimate
    pub neighbors_used: usize,
    /// Distance of the closest neighbor in window units
    pub nearest_distance: Option<f64>,
    /// Catalogue id of the closest neighbor
    pub nearest_event_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmplitudePrediction {
    /// Predicted peak ground velocity (m/s), [`NO_PREDICTION`] when unavailable
    pub amplitude: f64,
    pub lockloss: bool,
    /// Weighted standard deviation of the neighbor amplitudes (m/s)
    pub amplitude_uncertainty: f64,
    /// Spread of the neighbors' lockloss votes
    pub lockloss_uncertainty: f64,
    pub diagnostics: Diagnostics,
}

impl AmplitudePrediction {
    fn unavailable(outcome: Outcome, window_degrees: f64) -> Self {
        Self {
            amplitude: NO_PREDICTION,
            lockloss: false,
            amplitude_uncertainty: f64::INFINITY,
            lockloss_uncertainty: f64::INFINITY,
            diagnostics: Diagnostics {
                outcome,
                window_degrees,
                candidates: 0,
                neighbors_used: 0,
                nearest_distance: None,
                nearest_event_id: None,
            },
        }
    }

    pub fn is_available(&self) -> bool {
        self.diagnostics.outcome == Outcome::Neighbors
    }
}

#[derive(Debug, Clone, Default)]
pub struct AmplitudePredictor {
    params: AmplitudeParams,
}

impl AmplitudePredictor {
    pub fn new(params: AmplitudeParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &AmplitudeParams {
        &self.params
    }

    /// Lockloss decision for a predicted amplitude; equality is not a lockloss
    pub fn is_lockloss(&self, amplitude: f64) -> bool {
        amplitude > self.params.lockloss_threshold
    }

    /// Predict the peak amplitude for an event at (lat, lon) with `magnitude`
    pub fn predict(&self, catalogue: &[CatalogueEntry], lat: f64, lon: f64, magnitude: f64) -> AmplitudePrediction {
        let p = &self.params;
        if catalogue.is_empty() {
            return AmplitudePrediction::unavailable(Outcome::EmptyCatalogue, p.geo_threshold_degrees);
        }

        let mut theta = p.geo_threshold_degrees;
        let candidates = loop {
            let in_window: Vec<&CatalogueEntry> = catalogue
                .iter()
                .filter(|e| (e.latitude - lat).abs() < theta && (e.longitude - lon).abs() < theta)
                .collect();
            if !in_window.is_empty() {
                break in_window;
            }
            let widened = theta * 2.0;
            if widened > p.max_geo_threshold_degrees * (1.0 + 1e-9) {
                return AmplitudePrediction::unavailable(Outcome::NoNeighbors, theta);
            }
            theta = widened;
        };

        let mut ranked: Vec<(f64, &CatalogueEntry)> = candidates
            .iter()
            .map(|e| {
                let d_lat = (e.latitude - lat) / theta;
                let d_lon = (e.longitude - lon) / theta;
                let d_mag = (e.mag - magnitude) / p.magnitude_scale;
                ((d_lat * d_lat + d_lon * d_lon + d_mag * d_mag).sqrt(), *e)
            })
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
        ranked.truncate(p.neighbors.max(1));

        let raw: Vec<f64> = ranked.iter().map(|(d, _)| 1.0 / (d + DISTANCE_EPSILON)).collect();
        let total: f64 = raw.iter().sum();
        let weights: Vec<f64> = raw.iter().map(|w| w / total).collect();
        let amplitudes: Vec<f64> = ranked
            .iter()
            .map(|(_, e)| e.peak_amplitude_um * MICRONS_TO_METERS)
            .collect();

        let mean = weights.iter().zip(&amplitudes).map(|(w, a)| w * a).sum::<f64>();
        let variance = weights
            .iter()
            .zip(&amplitudes)
            .map(|(w, a)| w * (a - mean).powi(2))
            .sum::<f64>();
        let vote = weights
            .iter()
            .zip(&amplitudes)
            .filter(|(_, a)| self.is_lockloss(**a))
            .map(|(w, _)| w)
            .sum::<f64>();

        AmplitudePrediction {
            amplitude: mean,
            lockloss: self.is_lockloss(mean),
            amplitude_uncertainty: variance.sqrt(),
            lockloss_uncertainty: (vote * (1.0 - vote)).max(0.0).sqrt(),
            diagnostics: Diagnostics {
                outcome: Outcome::Neighbors,
                window_degrees: theta,
                candidates: candidates.len(),
                neighbors_used: ranked.len(),
                nearest_distance: ranked.first().map(|(d, _)| *d),
                nearest_event_id: ranked.first().map(|(_, e)| e.event_id.clone()),
            },
        }
    }
}
