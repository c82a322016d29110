//! Configuration loading and config file resolution
//!
//! The service reads a single TOML file. Every key except `pdl.directory`
//! has a built-in default; a missing or unparsable file is a fatal
//! configuration error reported before the polling loop starts.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable consulted when no `--config` argument is given
pub const CONFIG_ENV_VAR: &str = "SEISMON_CONFIG";

/// File name used for the working-directory and user-config fallbacks
pub const CONFIG_FILE_NAME: &str = "seismon.toml";

/// Complete service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Notice source (PDL client output directory)
    pub pdl: PdlConfig,

    #[serde(default)]
    pub prediction: PredictionConfig,

    #[serde(default)]
    pub catalogue: CatalogueConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file (created when absent)
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// Upper bound on retrying writes while SQLite reports "database is locked"
    #[serde(default = "default_max_lock_wait_ms")]
    pub max_lock_wait_ms: u64,

    /// Upper bound on a single catalogue table read
    #[serde(default = "default_catalogue_timeout_ms")]
    pub catalogue_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PdlConfig {
    /// Directory the notice client writes event folders into
    pub directory: PathBuf,

    /// Age after which cached event folders are purged
    #[serde(default = "default_retention_days")]
    pub retention_days: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionConfig {
    /// Earthquakes below this magnitude never get predictions
    #[serde(default = "default_min_eq_magnitude")]
    pub min_eq_magnitude: f64,

    /// How far back (days from now) notices are still ingested
    #[serde(default = "default_lookback_days")]
    pub lookback_days: f64,

    /// Half-width of the lat/lon search window around the epicenter
    #[serde(default = "default_geo_threshold_degrees")]
    pub geo_threshold_degrees: f64,

    /// Ceiling for window widening when the initial window is empty
    #[serde(default = "default_max_geo_threshold_degrees")]
    pub max_geo_threshold_degrees: f64,

    /// Ground velocity (m/s) above which a lockloss is predicted
    #[serde(default = "default_lockloss_amplitude_threshold")]
    pub lockloss_amplitude_threshold: f64,

    /// Number of nearest catalogue neighbors used in the regression
    #[serde(default = "default_neighbors")]
    pub neighbors: usize,

    /// Magnitude difference weighted the same as one window width
    #[serde(default = "default_magnitude_scale")]
    pub magnitude_scale: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogueConfig {
    /// Directory holding the bundled `<NETWORK>_processed_USGS_global_EQ_catalogue.csv` files
    #[serde(default = "default_catalogue_directory")]
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
}

/// Downstream export of new-event summaries (disabled when `directory` is unset)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ExportConfig {
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("seismon.db")
}

fn default_max_lock_wait_ms() -> u64 {
    5000
}

fn default_catalogue_timeout_ms() -> u64 {
    5000
}

fn default_retention_days() -> f64 {
    7.0
}

fn default_min_eq_magnitude() -> f64 {
    5.0
}

fn default_lookback_days() -> f64 {
    7.0
}

fn default_geo_threshold_degrees() -> f64 {
    0.1
}

fn default_max_geo_threshold_degrees() -> f64 {
    3.2
}

fn default_lockloss_amplitude_threshold() -> f64 {
    1e-6
}

fn default_neighbors() -> usize {
    5
}

fn default_magnitude_scale() -> f64 {
    0.5
}

fn default_catalogue_directory() -> PathBuf {
    PathBuf::from("input")
}

fn default_poll_interval_seconds() -> u64 {
    15
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_lock_wait_ms: default_max_lock_wait_ms(),
            catalogue_timeout_ms: default_catalogue_timeout_ms(),
        }
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            min_eq_magnitude: default_min_eq_magnitude(),
            lookback_days: default_lookback_days(),
            geo_threshold_degrees: default_geo_threshold_degrees(),
            max_geo_threshold_degrees: default_max_geo_threshold_degrees(),
            lockloss_amplitude_threshold: default_lockloss_amplitude_threshold(),
            neighbors: default_neighbors(),
            magnitude_scale: default_magnitude_scale(),
        }
    }
}

impl Default for CatalogueConfig {
    fn default() -> Self {
        Self {
            directory: default_catalogue_directory(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: default_poll_interval_seconds(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::Config(format!(
                "Missing config file: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Reject values the prediction pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        let p = &self.prediction;
        if !(p.geo_threshold_degrees > 0.0) {
            return Err(Error::Config(
                "prediction.geo_threshold_degrees must be > 0".to_string(),
            ));
        }
        if p.max_geo_threshold_degrees < p.geo_threshold_degrees {
            return Err(Error::Config(
                "prediction.max_geo_threshold_degrees must be >= geo_threshold_degrees"
                    .to_string(),
            ));
        }
        if !(p.lockloss_amplitude_threshold > 0.0) {
            return Err(Error::Config(
                "prediction.lockloss_amplitude_threshold must be > 0".to_string(),
            ));
        }
        if !(p.lookback_days > 0.0) {
            return Err(Error::Config(
                "prediction.lookback_days must be > 0".to_string(),
            ));
        }
        if p.neighbors == 0 {
            return Err(Error::Config("prediction.neighbors must be >= 1".to_string()));
        }
        if !(p.magnitude_scale > 0.0) {
            return Err(Error::Config(
                "prediction.magnitude_scale must be > 0".to_string(),
            ));
        }
        if self.scheduler.poll_interval_seconds == 0 {
            return Err(Error::Config(
                "scheduler.poll_interval_seconds must be >= 1".to_string(),
            ));
        }
        if !(self.pdl.retention_days > 0.0) {
            return Err(Error::Config("pdl.retention_days must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Config file resolution in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. `seismon.toml` in the working directory
/// 4. `<user config dir>/seismon/seismon.toml`
///
/// Falls through to the working-directory path when nothing exists so the
/// caller reports a missing file with a predictable name.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: Working directory
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return local;
    }

    // Priority 4: User config directory
    if let Some(user_config) = dirs::config_dir().map(|d| d.join("seismon").join(CONFIG_FILE_NAME)) {
        if user_config.is_file() {
            debug!("Using user config file {}", user_config.display());
            return user_config;
        }
    }

    local
}
