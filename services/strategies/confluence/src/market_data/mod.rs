//! # Market Data Providers
//!
//! ## Purpose
//!
//! Abstraction over the external market-data and account collaborator. The
//! engine only ever talks to a [`MarketDataProvider`]; which concrete client
//! sits behind it is a configuration choice.
//!
//! ## Integration Points
//!
//! - [`HttpMarketData`]: JSON candle service reached over HTTP
//! - [`SimulatedMarketData`]: in-process random-walk candles for local runs
//!
//! Every call may fail. Failures are isolated per instrument and timeframe by
//! the refresh scheduler.

pub mod http;
pub mod simulated;

pub use http::HttpMarketData;
pub use simulated::SimulatedMarketData;

use crate::config::{EngineConfig, MarketDataMode};
use crate::types::{Candle, Timeframe};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Account identity reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub account_id: u64,
    pub is_demo: bool,
}

#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Market data service error: {message}")]
    Service { message: String },

    #[error("Fetch of {instrument}/{timeframe} timed out after {timeout_ms}ms")]
    Timeout {
        instrument: String,
        timeframe: Timeframe,
        timeout_ms: u64,
    },

    #[error("Unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("Provider unavailable: {message}")]
    Unavailable { message: String },
}

pub type Result<T> = std::result::Result<T, MarketDataError>;

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Up to `count` candles for one instrument and timeframe, oldest first
    async fn fetch_candles(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Candle>>;

    /// Current account balance
    async fn balance(&self) -> Result<f64>;

    async fn account_info(&self) -> Result<AccountInfo>;
}

/// Build the provider selected by `config.market_data.mode`
pub fn from_config(config: &EngineConfig) -> Result<Arc<dyn MarketDataProvider>> {
    let market_data = &config.market_data;
    let account = AccountInfo {
        account_id: market_data.account_id,
        is_demo: market_data.is_demo,
    };

    match market_data.mode {
        MarketDataMode::Simulated => {
            info!("Using simulated market data");
            Ok(Arc::new(SimulatedMarketData::new(
                account,
                market_data.starting_balance,
            )))
        }
        MarketDataMode::Http => {
            info!("Using candle service at {}", market_data.endpoint);
            let client = HttpMarketData::new(
                &market_data.endpoint,
                config.scheduler.fetch_timeout(),
                account,
                market_data.starting_balance,
            )?;
            Ok(Arc::new(client))
        }
    }
}
