//! tally-scan - Stock Tally scan service
//!
//! Accepts scan events from the presentation client (or stdin for
//! keyboard-wedge scanners), keeps the session ledger and serves the
//! presentation API on port 5780.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use tally_common::config::{ConfigSource, RootFolderInitializer, RootFolderResolver, TomlConfig};
use tally_common::db::{init_database, settings};
use tally_common::events::EventBus;
use tally_scan::api::{self, AppContext};
use tally_scan::controller::{self, ControllerHandle, ControllerSettings};
use tally_scan::feedback::EventFeedback;
use tally_scan::lookup::LookupClient;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

/// Log filter until the bootstrap file has been read
const DEFAULT_LOG_LEVEL: &str = "info";

/// Event bus capacity; slow SSE clients past this lag and skip events
const EVENT_CAPACITY: usize = 256;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "tally-scan")]
#[command(about = "Stock Tally scan accumulation service")]
#[command(version)]
struct Args {
    /// HTTP port for the presentation API
    #[arg(short, long, env = "STOCKTALLY_PORT")]
    port: Option<u16>,

    /// Root folder holding the settings database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Bootstrap configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Treat each line read on stdin as a scan event
    #[arg(long)]
    stdin: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Installed before anything else logs; the configured level lands once
    // the bootstrap file is read
    let env_filter = EnvFilter::try_from_default_env().ok();
    let level_from_env = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_LEVEL)));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let args = Args::parse();

    let (toml_config, config_source) =
        TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // RUST_LOG overrides the configured level
    if !level_from_env {
        if let Err(e) = filter_handle.reload(EnvFilter::new(&toml_config.logging.level)) {
            warn!("Failed to apply log level '{}': {}", toml_config.logging.level, e);
        }
    }

    match &config_source {
        ConfigSource::Explicit(path) | ConfigSource::Platform(path) => {
            info!("Loaded configuration from {}", path.display());
        }
        ConfigSource::Defaults => {
            warn!("No configuration file found, using built-in defaults");
        }
    }

    info!(
        "Starting Stock Tally scan service (tally-scan) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(args.root_folder.clone())
        .with_toml_value(toml_config.root_folder.clone())
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());
    let db_pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let api_config = settings::load_api_config(&db_pool)
        .await
        .context("Failed to load API configuration")?;
    let missing = api_config.missing_fields();
    if missing.is_empty() {
        info!(domain = %api_config.domain, branch = %api_config.branch, "Loaded API configuration");
    } else {
        warn!(missing = ?missing, "API configuration incomplete; scanning stays blocked until it is saved");
    }

    let timing = &toml_config.timing;
    let backend = LookupClient::new(timing.lookup_timeout()).context("Failed to create lookup client")?;

    let bus = EventBus::new(EVENT_CAPACITY);
    let feedback = EventFeedback::new(bus.clone());
    let (handle, controller_task) = controller::spawn(
        ControllerSettings::from(timing),
        api_config,
        Arc::new(backend),
        Arc::new(feedback),
        bus,
    );

    let stdin_task = if args.stdin {
        info!("Reading scan events from stdin");
        Some(spawn_stdin_reader(handle.clone()))
    } else {
        None
    };

    let port = args.port.unwrap_or(toml_config.port);
    let ctx = AppContext::new(handle, db_pool.clone());
    api::run(ctx, port, shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(task) = stdin_task {
        task.abort();
    }

    // The server held the last handles; the controller winds down with them
    if let Err(e) = controller_task.await {
        error!("Controller task failed: {}", e);
    }
    db_pool.close().await;

    info!("Shutdown complete");
    Ok(())
}

/// Deliver stdin lines as scans until EOF
///
/// Lines are read on a plain thread: a blocked stdin read must not hold up
/// runtime shutdown. Aborting the returned task releases the controller handle.
fn spawn_stdin_reader(handle: ControllerHandle) -> JoinHandle<()> {
    let (tx, mut rx) = mpsc::channel::<String>(16);

    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });

    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            let code = line.trim();
            if code.is_empty() {
                continue;
            }
            match handle.scan(code).await {
                Ok(outcome) => debug!(code = %code, outcome = ?outcome, "Stdin scan processed"),
                Err(e) => warn!(code = %code, error = %e, "Stdin scan failed"),
            }
        }
        info!("Stdin closed, no further scans from stdin");
    })
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
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
