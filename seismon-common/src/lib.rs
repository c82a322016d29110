//! # Seismon Common Library
//!
//! Shared code for the seismon prediction service:
//! - Error type and result alias
//! - TOML configuration model and loading
//! - Database bootstrap and row models
//! - Time utilities

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use config::Config;
pub use error::{Error, Result};
