//! Headless confluence engine

use anyhow::{Context, Result};
use clap::Parser;
use confluence_config::resolve_config_path;
use confluence_strategy::config::MarketDataMode;
use confluence_strategy::logging::init_logging;
use confluence_strategy::{market_data, store, EngineBuilder, EngineConfig};
use std::path::PathBuf;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    /// (falls back to $CONFLUENCE_CONFIG_PATH, then configs/confluence.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Put the engine in running mode immediately
    #[arg(long)]
    autostart: bool,

    /// Use generated candles instead of the configured candle service
    #[arg(long)]
    simulated: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args
        .config
        .or_else(|| resolve_config_path("CONFLUENCE_CONFIG_PATH", "configs/confluence.toml"));
    let mut config = EngineConfig::load(config_path.as_deref())?;
    if args.simulated {
        config.market_data.mode = MarketDataMode::Simulated;
    }

    init_logging(&config.logging)?;

    info!("Starting Confluence Engine");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let provider =
        market_data::from_config(&config).context("Failed to create market data client")?;
    let store = store::open_store(&config.store).await;
    let engine = EngineBuilder::new(config, provider)
        .store(store)
        .build()
        .context("Failed to build engine")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let background = engine.spawn(shutdown_rx);

    if args.autostart {
        engine.start().await?;
    }

    info!("Confluence Engine running. Press Ctrl+C to stop.");

    signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutting down Confluence Engine");
    if engine.is_running() {
        engine.stop().await?;
    }
    let _ = shutdown_tx.send(true);
    if let Err(e) = background.await {
        warn!("Background tasks ended abnormally: {}", e);
    }

    Ok(())
}
