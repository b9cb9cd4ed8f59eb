//! M3U8 relay (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────────┐
//!                          │                     RELAY                        │
//!                          │                                                  │
//!     Player request       │  ┌─────────┐   ┌──────────┐   ┌──────────────┐   │
//!     ─────────────────────┼─▶│  http   │──▶│ security │──▶│    relay     │   │
//!                          │  │ server  │   │  origin  │   │ orchestrator │   │
//!                          │  └─────────┘   └──────────┘   └──────┬───────┘   │
//!                          │                                      │           │
//!                          │                   ┌──────────────────┼─────┐     │
//!                          │                   ▼                  ▼     │     │
//!                          │            ┌────────────┐    ┌───────────┐ │     │
//!                          │            │  headers + │    │ transport │─┼─────┼──▶ Upstream
//!                          │            │  sessions  │    │ (reqwest) │ │     │    CDN
//!                          │            └────────────┘    └─────┬─────┘ │     │
//!                          │                                    ▼       │     │
//!     Relay response       │  ┌──────────┐   ┌──────────────────────┐   │     │
//!     ◀────────────────────┼──│ response │◀──│ classify → playlist  │◀──┘     │
//!                          │  │ headers  │   │   rewrite | stream   │         │
//!                          │  └──────────┘   └──────────────────────┘         │
//!                          │                                                  │
//!                          │  config (hot reload) · observability · lifecycle │
//!                          └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use m3u8_relay::config::{load_config, load_default_config, ConfigWatcher};
use m3u8_relay::http::HttpServer;
use m3u8_relay::lifecycle::{spawn_signal_handler, Shutdown};
use m3u8_relay::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "m3u8-relay", version, about = "HTTP relay for HLS playlists and segments")]
struct Cli {
    /// TOML configuration file (watched for changes)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding the configuration
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_default_config()?,
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability);
    tracing::info!("m3u8-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        relay_path = %config.relay.path,
        allowed_origins = ?config.relay.allowed_origins,
        transport = ?config.upstream.transport,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, config_updates) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_handler(&shutdown);

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
