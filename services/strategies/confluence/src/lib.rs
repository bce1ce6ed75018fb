//! # Confluence Strategy
//!
//! ## Purpose
//!
//! Monitors a fixed catalog of OTC instruments, computes a Parabolic SAR
//! reading on the 1m, 5m and 15m candles of each, and raises a signal when all
//! three readings agree on an instrument with ready-level confidence.
//!
//! ## Integration Points
//!
//! - **Input**: candle series and account values from a [`MarketDataProvider`]
//! - **Output**: [`EngineEvent`]s to subscribers, trades to a [`TradeStore`]
//! - **Control**: start/stop/snapshot/status on [`ConfluenceEngine`]
//!
//! ## Architecture Role
//!
//! ```text
//! MarketDataProvider ─► RefreshScheduler ─► InstrumentRegistry ─► ConfluenceDetector
//!                                  │               ▲                      │
//!                                  ▼               │                      ▼
//!                            ParabolicSar   ReadinessTracker        StatePublisher
//! ```

pub mod catalog;
pub mod clock;
pub mod confidence;
pub mod config;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod logging;
pub mod market_data;
pub mod metrics;
pub mod position;
pub mod publisher;
pub mod readiness;
pub mod registry;
pub mod scheduler;
pub mod signals;
pub mod snapshot;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use confidence::{ConfidenceSource, Fixed, RandomWalk};
pub use config::EngineConfig;
pub use engine::{ConfluenceEngine, EngineBuilder};
pub use error::{EngineError, Result};
pub use indicators::{ParabolicSar, SarState};
pub use market_data::{AccountInfo, MarketDataError, MarketDataProvider};
pub use publisher::{StatePublisher, Subscription};
pub use scheduler::{run_cycle, CycleReport, RefreshScheduler, TickOutcome};
pub use signals::{ConfluenceDetector, ConfluenceSignal};
pub use snapshot::{BotState, EngineEvent, StatusReport};
pub use store::{TieredTradeStore, TradeStore};
pub use types::{
    Candle, Category, Direction, InstrumentSpec, InstrumentState, ReadinessStatus, Timeframe,
};
