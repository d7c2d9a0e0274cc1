//! QuietCut Server - Standalone headless server for QuietCut.
//!
//! This binary exposes the automatic rough-cut pipeline over HTTP/WebSocket
//! without a GUI. It's designed for server deployments where the QuietCut
//! service runs as a background daemon next to a media toolchain and an
//! optional transcription service.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::RwLock;
use quietcut_core::{bootstrap_services, start_server, AppState};
use tokio::signal;

use crate::config::ServerConfig;

/// QuietCut Server - Headless automatic rough-cut service.
#[derive(Parser, Debug)]
#[command(name = "quietcut-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "QUIETCUT_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file).
    #[arg(short = 'p', long, env = "QUIETCUT_BIND_PORT")]
    port: Option<u16>,

    /// Data directory for persistent job records.
    #[arg(short = 'd', long, env = "QUIETCUT_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("QuietCut Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.bind_port = port;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = Some(data_dir);
    }

    log::info!(
        "Configuration: bind_port={}, uploads={}, outputs={}, decoder={}, max_analyses={}",
        config.bind_port,
        config.upload_root.display(),
        config.output_root.display(),
        config.decoder_binary.display(),
        config.max_concurrent_analyses
    );
    if let Some(ref data_dir) = config.data_dir {
        log::info!("Using data directory: {}", data_dir.display());
    } else {
        log::info!("No data directory configured - job records will not persist");
    }
    match &config.transcription_endpoint {
        Some(endpoint) => log::info!("Transcription service: {}", endpoint),
        None => log::info!("Transcription disabled - filler detection will be skipped"),
    }

    // Bootstrap services (validates config, creates roots, sweeps records)
    let core_config = config.to_core_config();
    let services = bootstrap_services(&core_config).context("Failed to bootstrap services")?;

    log::info!("Services bootstrapped successfully");

    // Build app state for the HTTP server
    let app_state = AppState::new(&services, Arc::new(RwLock::new(core_config)));

    // Spawn HTTP server on the main tokio runtime. Analysis work never runs
    // here: the orchestrator dispatches it to the blocking worker pool.
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(app_state).await {
            log::error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");

    // Graceful shutdown: cancel analyses, close subscribers
    services.shutdown().await;

    // Abort the server task (nothing left to serve once services are down)
    server_handle.abort();

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
