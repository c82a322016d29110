//! Historical event catalogues per station network
//!
//! The database table is the primary source. An empty, failing or slow table
//! falls back to the bundled CSV for the network, and an unreadable CSV
//! yields an empty catalogue. Loading never fails.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::catalogues;
use crate::error::{PredictError, PredictResult};
use crate::network::NetworkProfile;
use seismon_common::db::CatalogueEntry;

/// Reasons a catalogue source could not be used
#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("catalogue table {table} is empty")]
    EmptyTable { table: &'static str },

    #[error("catalogue read from {table} timed out after {timeout_ms} ms")]
    Timeout { table: &'static str, timeout_ms: u64 },

    #[error("catalogue table {table} unreadable: {reason}")]
    Database { table: &'static str, reason: String },

    #[error("catalogue file {path} unreadable: {reason}")]
    File { path: PathBuf, reason: String },
}

/// Where a loaded catalogue came from
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogueSource {
    Database,
    File(PathBuf),
    /// Every source failed
    Empty,
}

/// Catalogue rows for one network
#[derive(Debug, Clone)]
pub struct Catalogue {
    pub network: NetworkProfile,
    pub source: CatalogueSource,
    pub entries: Vec<CatalogueEntry>,
}

impl Catalogue {
    pub fn empty(network: NetworkProfile) -> Self {
        Self {
            network,
            source: CatalogueSource::Empty,
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read-only access to the network catalogues
#[derive(Debug, Clone)]
pub struct CatalogueStore {
    pool: SqlitePool,
    directory: PathBuf,
    timeout: Duration,
}

impl CatalogueStore {
    pub fn new(pool: SqlitePool, directory: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            pool,
            directory: directory.into(),
            timeout,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Catalogue for a network: database first, then the bundled file, then empty
    pub async fn load(&self, network: NetworkProfile) -> Catalogue {
        match self.load_from_database(network).await {
            Ok(entries) => {
                debug!(network = %network, rows = entries.len(), "Catalogue loaded from database");
                return Catalogue {
                    network,
                    source: CatalogueSource::Database,
                    entries,
                };
            }
            Err(e) => {
                info!(network = %network, reason = %e, "Catalogue table unavailable, using bundled file");
            }
        }

        let path = network.fallback_file(&self.directory);
        match read_catalogue_file(&path) {
            Ok(entries) => {
                debug!(network = %network, rows = entries.len(), file = %path.display(), "Catalogue loaded from file");
                Catalogue {
                    network,
                    source: CatalogueSource::File(path),
                    entries,
                }
            }
            Err(e) => {
                warn!(network = %network, error = %e, "No catalogue available, amplitude predictions disabled");
                Catalogue::empty(network)
            }
        }
    }

    async fn load_from_database(&self, network: NetworkProfile) -> Result<Vec<CatalogueEntry>, CatalogueError> {
        let table = network.catalogue_table();
        let read = catalogues::read_catalogue(&self.pool, network);
        let entries = match tokio::time::timeout(self.timeout, read).await {
            Err(_) => {
                return Err(CatalogueError::Timeout {
                    table,
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
            Ok(Err(e)) => {
                return Err(CatalogueError::Database {
                    table,
                    reason: e.to_string(),
                })
            }
            Ok(Ok(entries)) => entries,
        };

        if entries.is_empty() {
            return Err(CatalogueError::EmptyTable { table });
        }
        Ok(entries)
    }

    /// Load each network's bundled file into its table when the table is empty
    ///
    /// Returns the number of rows inserted per network. A missing file is
    /// logged and skipped.
    pub async fn seed_from_files(&self) -> PredictResult<Vec<(NetworkProfile, usize)>> {
        let mut seeded = Vec::new();
        for network in NetworkProfile::all() {
            if catalogues::count_catalogue(&self.pool, network).await? > 0 {
                debug!(network = %network, "Catalogue table already populated");
                seeded.push((network, 0));
                continue;
            }

            let path = network.fallback_file(&self.directory);
            let entries = match read_catalogue_file(&path) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(network = %network, error = %e, "Catalogue seed skipped");
                    seeded.push((network, 0));
                    continue;
                }
            };

            let inserted = catalogues::insert_catalogue(&self.pool, network, &entries).await?;
            info!(network = %network, rows = inserted, file = %path.display(), "Catalogue table seeded");
            seeded.push((network, inserted));
        }
        Ok(seeded)
    }
}

/// Parse a catalogue CSV with the standard column headers
pub fn read_catalogue_file(path: &Path) -> Result<Vec<CatalogueEntry>, CatalogueError> {
    let file_error = |reason: String| CatalogueError::File {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| file_error(e.to_string()))?;

    reader
        .deserialize::<CatalogueEntry>()
        .map(|record| record.map_err(|e| file_error(e.to_string())))
        .collect()
}

impl From<CatalogueError> for PredictError {
    fn from(err: CatalogueError) -> Self {
        PredictError::Catalogue(err.to_string())
    }
}
