//! Confluence engine with its dashboard server

use anyhow::{Context, Result};
use clap::Parser;
use confluence_config::resolve_config_path;
use confluence_dashboard::{DashboardConfig, DashboardServer};
use confluence_strategy::config::MarketDataMode;
use confluence_strategy::logging::init_logging;
use confluence_strategy::{market_data, store, EngineBuilder, EngineConfig};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    /// (falls back to $CONFLUENCE_CONFIG_PATH, then configs/confluence.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured port
    #[arg(short, long)]
    port: Option<u16>,

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
    let mut engine_config = EngineConfig::load(config_path.as_deref())?;
    let mut dashboard_config = DashboardConfig::load(config_path.as_deref())?;
    if args.simulated {
        engine_config.market_data.mode = MarketDataMode::Simulated;
    }
    if let Some(port) = args.port {
        dashboard_config.port = port;
    }

    init_logging(&engine_config.logging)?;

    info!("Starting Confluence Dashboard");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {:?}", dashboard_config);

    let provider =
        market_data::from_config(&engine_config).context("Failed to create market data client")?;
    let store = store::open_store(&engine_config.store).await;
    let engine = EngineBuilder::new(engine_config, provider)
        .store(store)
        .build()
        .context("Failed to build engine")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let background = engine.spawn(shutdown_rx.clone());

    if args.autostart {
        engine.start().await?;
    }

    let server = DashboardServer::new(dashboard_config, engine.clone());
    let serve = server.run(shutdown_rx);
    tokio::pin!(serve);

    tokio::select! {
        result = &mut serve => {
            if let Err(e) = result {
                error!("Dashboard server error: {}", e);
                let _ = shutdown_tx.send(true);
                return Err(e.into());
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received");
            if engine.is_running() {
                engine.stop().await?;
            }
            let _ = shutdown_tx.send(true);
            serve.await?;
        }
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = background.await {
        warn!("Background tasks ended abnormally: {}", e);
    }

    Ok(())
}
