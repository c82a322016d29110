//! Error types for seismon-predict
//!
//! Only configuration errors are fatal. Travel-time and catalogue failures
//! are recovered inside their components; the remaining kinds reach the
//! scheduler, which logs them and moves on to the next pair or cycle.

use std::path::PathBuf;
use thiserror::Error;

use crate::traveltime::ModelError;

#[derive(Debug, Error)]
pub enum PredictError {
    /// Latitude/longitude outside the valid range or not finite
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// Travel-time table could not produce arrivals
    #[error("Travel-time model error: {0}")]
    Model(#[from] ModelError),

    /// Catalogue source unreadable
    #[error("Catalogue unavailable: {0}")]
    Catalogue(String),

    /// Notice could not be parsed or lacks required fields
    #[error("Malformed notice {path}: {reason}")]
    MalformedNotice { path: PathBuf, reason: String },

    /// Earthquake/prediction store write or read failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Missing or invalid startup configuration
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Common error: {0}")]
    Common(#[from] seismon_common::Error),
}

impl PredictError {
    /// Write contention that is worth retrying
    pub fn is_database_locked(&self) -> bool {
        match self {
            PredictError::Persistence(err) => err.to_string().contains("database is locked"),
            PredictError::Common(seismon_common::Error::Database(err)) => {
                err.to_string().contains("database is locked")
            }
            _ => false,
        }
    }
}

pub type PredictResult<T> = Result<T, PredictError>;
