//! Removal of stale notice folders
//!
//! Any directory below the notice root whose modification time is older
//! than the retention window is removed with its contents. Failures are
//! logged and counted, never raised.

use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeStats {
    pub removed: usize,
    pub failed: usize,
}

/// Remove directories under `directory` last modified more than `retention` before `now`
pub fn purge_stale(directory: &Path, retention: Duration, now: SystemTime) -> PurgeStats {
    let mut stats = PurgeStats::default();
    let mut entries = WalkDir::new(directory).min_depth(1).into_iter();

    while let Some(entry) = entries.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Purge could not read entry");
                stats.failed += 1;
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }

        let modified = match entry.metadata().ok().and_then(|m| m.modified().ok()) {
            Some(modified) => modified,
            None => continue,
        };
        let age = now.duration_since(modified).unwrap_or_default();
        if age <= retention {
            continue;
        }

        match std::fs::remove_dir_all(entry.path()) {
            Ok(()) => {
                debug!(folder = %entry.path().display(), age_s = age.as_secs(), "Purged folder");
                stats.removed += 1;
            }
            Err(e) => {
                warn!(folder = %entry.path().display(), error = %e, "Purge failed");
                stats.failed += 1;
            }
        }
        entries.skip_current_dir();
    }

    if stats.removed > 0 || stats.failed > 0 {
        info!(
            directory = %directory.display(),
            removed = stats.removed,
            failed = stats.failed,
            "Purged stale notice folders"
        );
    }
    stats
}

/// Retention window in days as a std duration
pub fn retention_from_days(days: f64) -> Duration {
    Duration::from_secs_f64((days * 86_400.0).max(0.0))
}
