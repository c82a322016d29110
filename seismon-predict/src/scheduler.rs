//! Polling loop
//!
//! One cycle: purge (optional), ingest new notices, load stations, then
//! compute a prediction for every (earthquake, station) pair that lacks one.
//! A failing pair is logged and skipped; the next cycle retries it.

use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::db::{earthquakes, predictions, stations};
use crate::error::PredictResult;
use crate::export::export_event;
use crate::ingest::{IngestOptions, IngestStats, NoticeIngestor, NoticeParser};
use crate::network::MonitoredStation;
use crate::purge::{purge_stale, retention_from_days, PurgeStats};
use crate::PredictionContext;
use seismon_common::time::{days_to_duration, now};

/// Per-cycle switches from the command line
#[derive(Debug, Clone, Default)]
pub struct CycleOptions {
    /// Re-read notices even when marked as seen
    pub repeat: bool,
    /// Remove stale notice folders before ingesting
    pub purge: bool,
    /// Overrides `prediction.lookback_days`
    pub lookback_days: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One cycle, then return
    Once,
    /// Cycle until cancelled
    Continuous,
}

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub purge: Option<PurgeStats>,
    pub ingest: IngestStats,
    pub stations: usize,
    /// Pairs eligible by magnitude
    pub pairs: usize,
    /// Pairs that already had a prediction
    pub existing: usize,
    pub computed: usize,
    pub failed: usize,
    pub exported: usize,
    /// Stopped early on cancellation
    pub cancelled: bool,
}

pub struct Scheduler {
    ctx: PredictionContext,
    ingestor: NoticeIngestor,
}

impl Scheduler {
    pub fn new(ctx: PredictionContext) -> Self {
        let ingestor = NoticeIngestor::new(ctx.pool.clone(), ctx.config.database.max_lock_wait_ms);
        Self { ctx, ingestor }
    }

    pub fn with_parser(ctx: PredictionContext, parser: Box<dyn NoticeParser>) -> Self {
        let ingestor =
            NoticeIngestor::with_parser(ctx.pool.clone(), parser, ctx.config.database.max_lock_wait_ms);
        Self { ctx, ingestor }
    }

    pub fn context(&self) -> &PredictionContext {
        &self.ctx
    }

    /// Run cycles per `mode`, sleeping `scheduler.poll_interval_seconds` in between
    pub async fn run(&self, mode: RunMode, options: &CycleOptions, cancel: &CancellationToken) -> PredictResult<()> {
        let interval = Duration::from_secs(self.ctx.config.scheduler.poll_interval_seconds);

        loop {
            info!("Looking for earthquakes to analyze");
            match self.run_cycle(options, cancel).await {
                Ok(report) => log_report(&report),
                Err(e) => error!(error = %e, "Cycle failed, retrying next poll"),
            }

            if mode == RunMode::Once || cancel.is_cancelled() {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("Prediction loop stopped");
        Ok(())
    }

    pub async fn run_cycle(&self, options: &CycleOptions, cancel: &CancellationToken) -> PredictResult<CycleReport> {
        let config = &self.ctx.config;
        let mut report = CycleReport::default();

        if options.purge {
            let directory = config.pdl.directory.clone();
            let retention = retention_from_days(config.pdl.retention_days);
            report.purge = match tokio::task::spawn_blocking(move || {
                purge_stale(&directory, retention, SystemTime::now())
            })
            .await
            {
                Ok(stats) => Some(stats),
                Err(e) => {
                    warn!(error = %e, "Purge task failed");
                    None
                }
            };
        }

        debug!("Discovering earthquakes");
        let lookback_days = options.lookback_days.unwrap_or(config.prediction.lookback_days);
        let ingest_options = IngestOptions {
            repeat: options.repeat,
            lookback: days_to_duration(lookback_days),
            now: now(),
        };
        report.ingest = self.ingestor.ingest(&config.pdl.directory, &ingest_options).await?;

        debug!("Discovering stations");
        let sites: Vec<MonitoredStation> = stations::query_stations(&self.ctx.pool)
            .await?
            .into_iter()
            .map(MonitoredStation::from)
            .collect();
        report.stations = sites.len();

        let quakes =
            earthquakes::query_earthquakes_min_magnitude(&self.ctx.pool, config.prediction.min_eq_magnitude).await?;

        'events: for eq in &quakes {
            let mut computed_for_event = 0;
            for site in &sites {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    break 'events;
                }
                report.pairs += 1;

                match predictions::prediction_exists(&self.ctx.pool, &eq.event_id, &site.station.name).await {
                    Ok(true) => {
                        report.existing += 1;
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        error!(event_id = %eq.event_id, station = %site.station.name, error = %e, "Prediction lookup failed");
                        report.failed += 1;
                        continue;
                    }
                }

                match self.ctx.engine.compute(eq, site).await {
                    Ok(_) => {
                        report.computed += 1;
                        computed_for_event += 1;
                    }
                    Err(e) => {
                        error!(event_id = %eq.event_id, station = %site.station.name, error = %e, "Prediction failed");
                        report.failed += 1;
                    }
                }
            }

            if computed_for_event > 0 {
                if let Some(directory) = &config.export.directory {
                    match export_event(directory, eq) {
                        Ok(Some(path)) => {
                            info!(event_id = %eq.event_id, file = %path.display(), "Exported new event");
                            report.exported += 1;
                        }
                        Ok(None) => {}
                        Err(e) => warn!(event_id = %eq.event_id, error = %e, "Event export failed"),
                    }
                }
            }
        }

        Ok(report)
    }
}

fn log_report(report: &CycleReport) {
    let ingest = &report.ingest;
    info!(
        ingested = ingest.ingested,
        updated = ingest.updated,
        malformed = ingest.malformed,
        too_old = ingest.too_old,
        computed = report.computed,
        failed = report.failed,
        exported = report.exported,
        "Cycle complete"
    );
}
