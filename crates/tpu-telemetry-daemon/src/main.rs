//! TPU Telemetry Daemon
//!
//! Samples the TPU's on-board and GPS measurements, each on its own interval,
//! and publishes every reading as a JSON line.

mod config;
mod publish;
mod sensors;
mod state;
mod web;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tpu_telemetry_core::{ChannelSink, Registry, Scheduler};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use state::AppState;

#[derive(Parser)]
#[command(name = "tputelemd")]
#[command(about = "Telemetry collection daemon for the TPU")]
#[command(version)]
struct Cli {
    /// Configuration file (built-in defaults when omitted)
    #[arg(short, long, env = "TPU_TELEMETRY_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample every enabled source once, print the readings and exit
    Probe,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; stdout is reserved for publications
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = match &cli.config {
        Some(path) => {
            let config = Config::load(path).context("Failed to load configuration")?;
            info!("Loaded configuration from: {}", path.display());
            config
        }
        None => {
            info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    match cli.command {
        Some(Commands::Probe) => probe(config).await,
        None => run(config).await,
    }
}

async fn run(config: Config) -> Result<()> {
    // Sources acquire their handles (sockets, PIDs) up front, which may block
    let sources_config = config.sources.clone();
    let sources = tokio::task::spawn_blocking(move || sensors::from_config(&sources_config))
        .await
        .context("Source setup panicked")?;

    let mut registry = Registry::new();
    for configured in sources {
        registry
            .register(configured.source, configured.interval_ms)
            .context("Invalid source configuration")?;
    }
    if registry.is_empty() {
        warn!("No measurement sources available");
    }

    // Publisher drains the sink channel
    let state = Arc::new(AppState::new());
    let (sink, rx) = ChannelSink::new();
    let stdout = config
        .publish
        .stdout
        .then(|| tokio::io::BufWriter::new(tokio::io::stdout()));
    let publisher = tokio::spawn(publish::publish_loop(rx, state.clone(), stdout));

    let scheduler = Scheduler::start(registry, Arc::new(sink));
    state.set_loops(scheduler.len());

    // Setup Unix signal handlers
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    // Optionally start web server
    if config.web.enable {
        let app = web::create_router(state.clone());
        let addr: SocketAddr = config
            .web
            .listen
            .parse()
            .context("Invalid listen address")?;
        let listener = TcpListener::bind(addr).await?;
        info!("Status API listening on http://{}", addr);

        tokio::select! {
            result = axum::serve(listener, app) => {
                result?;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down");
            }
        }
    } else {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down");
            }
        }
    }

    scheduler.shutdown();
    if tokio::time::timeout(Duration::from_secs(2), publisher)
        .await
        .is_err()
    {
        warn!("Publisher did not drain in time");
    }

    Ok(())
}

/// Samples every enabled source once, the way each measurement would be
/// checked by hand.
async fn probe(config: Config) -> Result<()> {
    tokio::task::spawn_blocking(move || {
        for mut configured in sensors::from_config(&config.sources) {
            let source = configured.source.as_mut();
            // Delta-based sources report 0 on their first call
            let first = source.sample();
            std::thread::sleep(Duration::from_millis(100));
            let result = first.and_then(|_| source.sample());

            match result {
                Ok(readings) if readings.is_empty() => {
                    println!("{}: no readings", source.id());
                }
                Ok(readings) => {
                    for reading in readings {
                        println!(
                            "{}: {} {:?} {}",
                            source.id(),
                            reading.metric_path(),
                            reading.values(),
                            reading.unit()
                        );
                    }
                }
                Err(e) => println!("{}: error: {}", source.id(), e),
            }
        }
    })
    .await
    .context("Probe panicked")
}
