//! Shared fixtures for the engine integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use confluence_strategy::market_data::Result as MarketDataResult;
use confluence_strategy::store::TieredTradeStore;
use confluence_strategy::{
    AccountInfo, Candle, Category, ConfidenceSource, ConfluenceEngine, Direction, EngineBuilder,
    EngineConfig, Fixed, InstrumentSpec, InstrumentState, ManualClock, MarketDataError,
    MarketDataProvider, Timeframe,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub const SERIES_LEN: usize = 30;

/// Provider whose candles trend toward a scripted close per instrument
pub struct ScriptedProvider {
    trends: Mutex<HashMap<String, (Direction, f64)>>,
    failing: Mutex<HashSet<String>>,
    stalled: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    gate: Option<Arc<Semaphore>>,
    fetches: AtomicUsize,
    balance: f64,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            trends: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            stalled: Mutex::new(HashSet::new()),
            panicking: Mutex::new(HashSet::new()),
            gate: None,
            fetches: AtomicUsize::new(0),
            balance: 5.30,
        }
    }

    /// Every fetch waits for a permit on `gate` before answering
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    pub fn set_trend(&self, instrument: &str, direction: Direction, last_close: f64) {
        self.trends
            .lock()
            .insert(instrument.to_string(), (direction, last_close));
    }

    pub fn fail(&self, instrument: &str) {
        self.failing.lock().insert(instrument.to_string());
    }

    pub fn recover(&self, instrument: &str) {
        self.failing.lock().remove(instrument);
    }

    /// Fetches for `instrument` never complete
    pub fn stall(&self, instrument: &str) {
        self.stalled.lock().insert(instrument.to_string());
    }

    /// Fetches for `instrument` panic until [`ScriptedProvider::calm`]
    pub fn panic_on(&self, instrument: &str) {
        self.panicking.lock().insert(instrument.to_string());
    }

    pub fn calm(&self, instrument: &str) {
        self.panicking.lock().remove(instrument);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MarketDataProvider for ScriptedProvider {
    async fn fetch_candles(
        &self,
        instrument: &str,
        _timeframe: Timeframe,
        _count: usize,
    ) -> MarketDataResult<Vec<Candle>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);

        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await;
        }
        let panics = self.panicking.lock().contains(instrument);
        if panics {
            panic!("scripted panic for {}", instrument);
        }
        if self.stalled.lock().contains(instrument) {
            std::future::pending::<()>().await;
        }
        if self.failing.lock().contains(instrument) {
            return Err(MarketDataError::Service {
                message: format!("scripted failure for {}", instrument),
            });
        }

        let (direction, last_close) = self
            .trends
            .lock()
            .get(instrument)
            .copied()
            .unwrap_or((Direction::Long, 100.0));
        Ok(trending_series(direction, last_close))
    }

    async fn balance(&self) -> MarketDataResult<f64> {
        Ok(self.balance)
    }

    async fn account_info(&self) -> MarketDataResult<AccountInfo> {
        Ok(AccountInfo {
            account_id: 42,
            is_demo: true,
        })
    }
}

/// Steady trend over [`SERIES_LEN`] one-minute bars ending exactly at `last_close`
pub fn trending_series(direction: Direction, last_close: f64) -> Vec<Candle> {
    let step = last_close * 0.001;
    let sign = match direction {
        Direction::Long => -1.0,
        Direction::Short => 1.0,
    };

    let mut candles = Vec::with_capacity(SERIES_LEN);
    let mut previous = last_close + sign * step * SERIES_LEN as f64;
    for i in 0..SERIES_LEN {
        let close = last_close + sign * step * (SERIES_LEN - 1 - i) as f64;
        let high = previous.max(close) + step * 0.1;
        let low = previous.min(close) - step * 0.1;
        candles.push(Candle::new(i as i64 * 60, previous, high, low, close));
        previous = close;
    }
    candles
}

/// Constant raw score for every instrument
pub struct Constant(pub f64);

impl ConfidenceSource for Constant {
    fn next(&mut self, _instrument: &InstrumentState) -> f64 {
        self.0
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap()
}

pub fn test_config(catalog: &[(&str, f64)]) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.catalog = Some(
        catalog
            .iter()
            .map(|(id, confidence)| InstrumentSpec {
                id: id.to_string(),
                category: Category::Crypto,
                confidence: *confidence,
            })
            .collect(),
    );
    config.store.path = None;
    config
}

pub struct Harness {
    pub engine: ConfluenceEngine,
    pub provider: Arc<ScriptedProvider>,
    pub clock: Arc<ManualClock>,
    pub store: Arc<TieredTradeStore>,
}

pub fn harness(config: EngineConfig, provider: ScriptedProvider) -> Harness {
    harness_with_source(config, provider, Box::new(Fixed))
}

pub fn harness_with_source(
    config: EngineConfig,
    provider: ScriptedProvider,
    source: Box<dyn ConfidenceSource>,
) -> Harness {
    let provider = Arc::new(provider);
    let clock = Arc::new(ManualClock::new(start_time()));
    let store = Arc::new(TieredTradeStore::memory_only());

    let engine = EngineBuilder::new(config, provider.clone())
        .store(store.clone())
        .clock(clock.clone())
        .confidence_source(source)
        .build()
        .expect("engine builds from test config");

    Harness {
        engine,
        provider,
        clock,
        store,
    }
}
