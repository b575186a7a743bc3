//! # timetrack Main Entry Point
//!
//! Runs the HTTP API, the background job workers, or both.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use timetrack::{
    config::{AppConfig, ConfigLoader},
    crypto::CryptoKey,
    db,
    jobs::{ClickUpSyncHandler, JobHandler, ResourceSyncHandler, ScreenshotHandler, Worker},
    providers::Registry,
    server::{AppState, run_server},
    storage, telemetry,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API (default)
    Serve {
        /// Do not run job workers in this process
        #[arg(long)]
        no_workers: bool,
    },
    /// Run only the job workers
    Worker,
    /// Apply pending database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration from layered env files and variables
    let config = ConfigLoader::new().load().context("loading configuration")?;
    telemetry::init_tracing(&config).context("initializing tracing")?;
    if let Ok(redacted_json) = config.redacted_json() {
        info!(profile = %config.profile, config = %redacted_json, "Loaded configuration");
    }
    config.validate().context("validating configuration")?;

    let db = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;
    db::run_migrations(&db).await.context("running migrations")?;

    let command = cli.command.unwrap_or(Commands::Serve { no_workers: false });
    if matches!(command, Commands::Migrate) {
        info!("Migrations applied");
        return Ok(());
    }

    let state = build_state(config, db)?;
    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone());

    let mut workers = JoinSet::new();
    match command {
        Commands::Serve { no_workers } => {
            if !no_workers {
                spawn_workers(&state, &shutdown, &mut workers);
            }
            if let Err(e) = run_server(state, shutdown.clone()).await {
                error!(error = %e, "Server exited with error");
                shutdown.cancel();
                workers.join_all().await;
                return Err(anyhow!("server error: {e}"));
            }
        }
        Commands::Worker => {
            spawn_workers(&state, &shutdown, &mut workers);
            shutdown.cancelled().await;
        }
        Commands::Migrate => {}
    }

    workers.join_all().await;
    info!("Shutdown complete");
    Ok(())
}

fn build_state(config: AppConfig, db: sea_orm::DatabaseConnection) -> Result<AppState> {
    let key_bytes = config
        .crypto_key
        .clone()
        .context("crypto key not present in configuration")?;
    let crypto_key = CryptoKey::new(key_bytes).context("initializing crypto key")?;
    let storage = storage::from_config(&config.storage).context("initializing object storage")?;
    let registry = Arc::new(Registry::from_config(&config));
    info!(enabled = ?registry.list_enabled(), "Provider registry ready");

    Ok(AppState::new(
        Arc::new(config),
        db,
        registry,
        crypto_key,
        storage,
    ))
}

fn spawn_workers(state: &AppState, shutdown: &CancellationToken, set: &mut JoinSet<()>) {
    let handlers: Vec<Arc<dyn JobHandler>> = vec![
        Arc::new(ScreenshotHandler::new(
            state.db.clone(),
            Arc::clone(&state.storage),
        )),
        Arc::new(ClickUpSyncHandler::new(
            state.db.clone(),
            state.crypto_key.clone(),
            Arc::clone(&state.registry),
        )),
        Arc::new(ResourceSyncHandler::new(state.sync_service())),
    ];

    for handler in handlers {
        let worker = Worker::new(state.db.clone(), handler, state.config.workers.clone());
        set.spawn(worker.run(shutdown.clone()));
    }
}

fn spawn_signal_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
        shutdown.cancel();
    });
}
