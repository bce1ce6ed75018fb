//! Error types for the confluence engine

use crate::market_data::MarketDataError;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine is already running")]
    AlreadyRunning,

    #[error("Engine is not running")]
    NotRunning,

    #[error("Market data error: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("Trade store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;
