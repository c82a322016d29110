//! seismon-predict - earthquake early-warning prediction service
//!
//! Polls the notice directory, stores new earthquakes and writes arrival-time
//! and ground-motion predictions for every monitored station.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use seismon_common::config::{resolve_config_path, CONFIG_ENV_VAR};
use seismon_common::db::{create_schema, drop_schema, init_database};
use seismon_common::Config;
use seismon_predict::db::stations::seed_stations;
use seismon_predict::scheduler::{CycleOptions, RunMode, Scheduler};
use seismon_predict::PredictionContext;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "seismon-predict")]
#[command(about = "Earthquake arrival-time and ground-motion prediction service")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short = 'C', long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Run a single cycle and exit
    #[arg(short, long)]
    debug: bool,

    /// Re-read notices that were already seen
    #[arg(short, long)]
    repeat: bool,

    /// Remove stale notice folders each cycle
    #[arg(short, long)]
    purge: bool,

    /// Recreate all tables, register stations and seed catalogues before the first cycle
    #[arg(short, long)]
    init_db: bool,

    /// Ingestion lookback in days (overrides prediction.lookback_days)
    #[arg(short, long)]
    lookback: Option<f64>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let loaded = Config::load(&config_path);

    let level = if args.verbose {
        "debug".to_string()
    } else {
        loaded
            .as_ref()
            .map(|c| c.logging.level.clone())
            .unwrap_or_else(|_| "info".to_string())
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .init();

    info!(
        "Starting seismon-predict v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return Err(e).context("Configuration error");
        }
    };
    info!("Config file: {}", config_path.display());

    if let Some(days) = args.lookback {
        config.prediction.lookback_days = days;
        config.validate().context("Invalid --lookback")?;
    }

    let pool = init_database(&config.database.path)
        .await
        .context("Failed to open database")?;
    info!("Database: {}", config.database.path.display());

    if args.init_db {
        info!("Recreating tables");
        drop_schema(&pool).await.context("Failed to drop tables")?;
        create_schema(&pool).await.context("Failed to create tables")?;
    }

    let stations = seed_stations(&pool).await.context("Failed to register stations")?;
    info!("{} stations registered", stations);

    let ctx = PredictionContext::new(pool, config);

    if args.init_db {
        let seeded = ctx
            .engine
            .catalogues()
            .seed_from_files()
            .await
            .context("Failed to seed catalogues")?;
        for (network, rows) in seeded {
            info!(network = %network, rows, "Catalogue seeding");
        }
    }

    let options = CycleOptions {
        repeat: args.repeat || args.init_db,
        purge: args.purge,
        lookback_days: None,
    };
    let mode = if args.debug { RunMode::Once } else { RunMode::Continuous };

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let scheduler = Scheduler::new(ctx);
    scheduler.run(mode, &options, &cancel).await?;

    info!("seismon-predict stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Ctrl+C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
