//! LedgerKV - In-memory user-record KV server
//!
//! Entry point: parses the CLI, assembles configuration, wires the storage
//! engine to the readiness-driven TCP server and runs the loop.

// Use jemalloc for better multi-threaded performance
#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::Parser;
use ledgerkv::config::Config;
use ledgerkv::health::HealthServer;
use ledgerkv::metrics::Metrics;
use ledgerkv::server::{CommandHandler, Server};
use ledgerkv::storage::StorageEngine;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// LedgerKV server
#[derive(Parser, Debug)]
#[command(name = "ledgerkv")]
#[command(about = "In-memory user-record key/value server")]
#[command(version)]
struct Args {
    /// Event model: poll or epoll
    #[arg(long)]
    model: Option<String>,

    /// IPv4 address to bind
    #[arg(long)]
    host: Option<String>,

    /// TCP port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<String>,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Configuration: file or env defaults, then CLI overrides.
    let mut config = if let Some(path) = &args.config {
        info!("Loading configuration from {path}");
        match Config::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("{e}");
                std::process::exit(1);
            }
        }
    } else {
        info!("Using environment configuration (set LEDGERKV_* vars to customize)");
        Config::from_env()
    };

    if let Some(model) = &args.model {
        match model.parse() {
            Ok(model) => config.server.model = model,
            Err(e) => {
                error!("{e}");
                std::process::exit(1);
            }
        }
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    info!("Starting LedgerKV v{}", ledgerkv::VERSION);
    info!("Configuration: {:?}", config);

    // Storage engine shared by every connection.
    let engine = match StorageEngine::new(&config.storage) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            error!("Invalid storage configuration: {e}");
            std::process::exit(1);
        }
    };

    let metrics = Arc::new(Metrics::new());

    // Health/metrics endpoint runs beside the event loop.
    let health_server = if config.metrics.enabled {
        let health = Arc::new(HealthServer::new(Arc::clone(&metrics)));
        let health_clone = Arc::clone(&health);
        let metrics_config = config.metrics.clone();

        std::thread::spawn(move || {
            if let Err(e) = health_clone.run(&metrics_config) {
                error!("Health server error: {e}");
            }
        });

        Some(health)
    } else {
        None
    };

    let handler = Arc::new(CommandHandler::new(engine, Arc::clone(&metrics)));
    let mut server = match Server::bind(config.server.clone(), handler, metrics) {
        Ok(server) => server,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    if let Some(health) = &health_server {
        health.set_ready(true);
        info!("Server is ready");
    }

    server.run()?;

    if let Some(health) = &health_server {
        health.stop();
    }
    info!("LedgerKV stopped");
    Ok(())
}
