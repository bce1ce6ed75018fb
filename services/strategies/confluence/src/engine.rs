//! # Confluence Engine
//!
//! ## Purpose
//!
//! The explicit context object that owns every piece of engine state: the
//! instrument registry, the readiness tracker, the operational mode, the open
//! position and the collaborators (market data, trade store, publisher).
//!
//! ## Integration Points
//!
//! - **Control**: [`ConfluenceEngine::start`], [`ConfluenceEngine::stop`],
//!   [`ConfluenceEngine::snapshot`], [`ConfluenceEngine::status`]
//! - **Output**: [`EngineEvent`]s through [`ConfluenceEngine::subscribe`]
//! - **Background work**: [`ConfluenceEngine::spawn`] drives the refresh
//!   scheduler, the confidence drift loop, the balance loop and the one-off
//!   self-test until the shutdown signal flips
//!
//! ## Architecture Role
//!
//! ```text
//! drift loop ─┐                       ┌─► StatePublisher ─► subscribers
//!             ├─► registry/tracker ───┤
//! scheduler ──┘                       └─► TradeStore
//! ```
//!
//! Locks are never held across an await. When more than one is needed they
//! are taken in the order control, tracker, confidence source, registry.

use crate::clock::{Clock, SystemClock};
use crate::confidence::{ConfidenceSource, RandomWalk};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::indicators::{ParabolicSar, SarState};
use crate::market_data::{AccountInfo, MarketDataProvider};
use crate::metrics::EngineMetrics;
use crate::position::{ClosedPosition, OpenPosition, TradeDirection};
use crate::publisher::{StatePublisher, Subscription};
use crate::readiness::{PriceEntry, ReadinessTracker};
use crate::registry::InstrumentRegistry;
use crate::scheduler::{fetch_series, ReadingUpdate, RefreshScheduler, RefreshedInstrument};
use crate::signals::{ConfluenceDetector, ConfluenceSignal};
use crate::snapshot::{BotState, EngineEvent, StatusReport};
use crate::store::{NewTrade, TieredTradeStore, TradeStore, TradeUpdate};
use crate::types::{InstrumentState, Timeframe};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Operational mode and account values shown in snapshots
#[derive(Debug, Default)]
struct ControlState {
    running: bool,
    connected: bool,
    balance: f64,
    current_price: Option<f64>,
    position: Option<OpenPosition>,
    account: Option<AccountInfo>,
}

struct EngineInner {
    config: EngineConfig,
    registry: InstrumentRegistry,
    tracker: Mutex<ReadinessTracker>,
    confidence: Mutex<Box<dyn ConfidenceSource>>,
    control: RwLock<ControlState>,
    /// Last 1m close per instrument, used for entry and exit prices
    latest_prices: RwLock<HashMap<String, f64>>,
    provider: Arc<dyn MarketDataProvider>,
    store: Arc<dyn TradeStore>,
    publisher: StatePublisher,
    metrics: EngineMetrics,
    detector: ConfluenceDetector,
    sar: ParabolicSar,
    clock: Arc<dyn Clock>,
}

/// Cheap to clone handle to the engine
#[derive(Clone)]
pub struct ConfluenceEngine {
    inner: Arc<EngineInner>,
}

pub struct EngineBuilder {
    config: EngineConfig,
    provider: Arc<dyn MarketDataProvider>,
    store: Option<Arc<dyn TradeStore>>,
    confidence: Option<Box<dyn ConfidenceSource>>,
    clock: Option<Arc<dyn Clock>>,
    subscriber_capacity: usize,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig, provider: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            config,
            provider,
            store: None,
            confidence: None,
            clock: None,
            subscriber_capacity: 64,
        }
    }

    /// Defaults to a memory-only store
    pub fn store(mut self, store: Arc<dyn TradeStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Defaults to a random walk with the configured drift step
    pub fn confidence_source(mut self, source: Box<dyn ConfidenceSource>) -> Self {
        self.confidence = Some(source);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn subscriber_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<ConfluenceEngine> {
        self.config
            .validate()
            .map_err(|e| EngineError::Configuration {
                message: format!("{:#}", e),
            })?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let registry =
            InstrumentRegistry::new(self.config.instruments(), self.config.readiness.clone());
        let mut tracker = ReadinessTracker::new(self.config.readiness.clone());
        tracker.seed(&registry.snapshot(), clock.now());

        let confidence = self
            .confidence
            .unwrap_or_else(|| Box::new(RandomWalk::new(self.config.readiness.drift_step)));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(TieredTradeStore::memory_only()));

        info!(
            instruments = registry.len(),
            batch_size = self.config.scheduler.batch_size,
            "Confluence engine initialized"
        );

        Ok(ConfluenceEngine {
            inner: Arc::new(EngineInner {
                detector: ConfluenceDetector::new(self.config.readiness.ready_threshold),
                sar: ParabolicSar::new(self.config.sar),
                control: RwLock::new(ControlState {
                    balance: self.config.market_data.starting_balance,
                    ..ControlState::default()
                }),
                config: self.config,
                registry,
                tracker: Mutex::new(tracker),
                confidence: Mutex::new(confidence),
                latest_prices: RwLock::new(HashMap::new()),
                provider: self.provider,
                store,
                publisher: StatePublisher::new(self.subscriber_capacity),
                metrics: EngineMetrics::new(),
                clock,
            }),
        })
    }
}

impl ConfluenceEngine {
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &InstrumentRegistry {
        &self.inner.registry
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.inner.metrics
    }

    pub fn publisher(&self) -> &StatePublisher {
        &self.inner.publisher
    }

    pub fn provider(&self) -> &Arc<dyn MarketDataProvider> {
        &self.inner.provider
    }

    pub fn sar(&self) -> &ParabolicSar {
        &self.inner.sar
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    pub fn is_running(&self) -> bool {
        self.inner.control.read().running
    }

    pub fn current_position(&self) -> Option<OpenPosition> {
        self.inner.control.read().position.clone()
    }

    /// Switch to running: reset every instrument and the readiness tracker,
    /// then publish. Fails without side effects when already running.
    pub async fn start(&self) -> Result<()> {
        {
            let mut control = self.inner.control.write();
            if control.running {
                return Err(EngineError::AlreadyRunning);
            }

            let now = self.now();
            let mut tracker = self.inner.tracker.lock();
            self.inner.registry.reset();
            tracker.seed(&self.inner.registry.snapshot(), now);

            control.running = true;
            control.connected = true;
            control.position = None;
        }

        info!("Confluence engine started");
        self.refresh_balance().await;
        self.publish_state().await;
        Ok(())
    }

    /// Switch to stopped and drop any open position without settling it
    pub async fn stop(&self) -> Result<()> {
        {
            let mut control = self.inner.control.write();
            if !control.running {
                return Err(EngineError::NotRunning);
            }

            if let Some(position) = control.position.take() {
                info!(
                    instrument = %position.instrument,
                    trade = %position.trade_id,
                    "Open position discarded on stop"
                );
            }
            control.running = false;
            control.connected = false;
        }

        info!("Confluence engine stopped");
        self.publish_state().await;
        Ok(())
    }

    /// State from cached account values
    pub fn current_state(&self) -> BotState {
        let instruments = self.inner.registry.snapshot();
        let control = self.inner.control.read();
        BotState {
            running: control.running,
            connected: control.connected,
            balance: control.balance,
            current_price: control.current_price,
            instruments,
            current_position: control.position.clone(),
            account_info: control.account,
            generated_at: self.now(),
        }
    }

    /// Latest state with live account info; falls back to the cached account
    pub async fn snapshot(&self) -> BotState {
        match self.inner.provider.account_info().await {
            Ok(account) => {
                self.inner.control.write().account = Some(account);
            }
            Err(e) => warn!("Account info unavailable, using cached value: {}", e),
        }
        self.current_state()
    }

    /// Snapshot plus trade statistics, recent trades and counters
    pub async fn status(&self) -> Result<StatusReport> {
        let state = self.snapshot().await;
        let stats = self.inner.store.stats().await?;
        let trades = self
            .inner
            .store
            .recent_trades(self.inner.config.store.recent_limit)
            .await?;

        Ok(StatusReport {
            state,
            stats,
            trades,
            metrics: self.inner.metrics.snapshot(),
        })
    }

    pub async fn subscribe(&self) -> Subscription {
        self.inner.publisher.subscribe().await
    }

    /// Publish the current state to every subscriber
    pub async fn publish_state(&self) -> usize {
        let state = Arc::new(self.current_state());
        self.inner.publisher.broadcast(EngineEvent::State(state)).await
    }

    /// One drift tick: new raw scores through the readiness hysteresis
    pub fn drift_confidence(&self) {
        let now = self.now();
        let mut tracker = self.inner.tracker.lock();
        let mut source = self.inner.confidence.lock();
        self.inner.registry.with_all_mut(|instruments| {
            for instrument in instruments.iter_mut() {
                let raw = source.next(instrument);
                tracker.apply_confidence(instrument, raw, now);
            }
        });
    }

    /// Pull the balance from the provider; failures keep the previous value
    pub async fn refresh_balance(&self) {
        match self.inner.provider.balance().await {
            Ok(balance) => {
                let mut control = self.inner.control.write();
                if (control.balance - balance).abs() > f64::EPSILON {
                    info!("Balance updated: {:.2}", balance);
                    control.balance = balance;
                }
            }
            Err(e) => warn!("Balance refresh failed: {}", e),
        }
    }

    /// Write one batch of refresh results back into the registry
    pub(crate) fn apply_refresh(&self, refreshed: &[RefreshedInstrument]) {
        for result in refreshed {
            self.inner.registry.update(&result.id, |instrument| {
                for (timeframe, update) in Timeframe::ALL.into_iter().zip(result.readings) {
                    if let ReadingUpdate::Set(reading) = update {
                        instrument.readings.set(timeframe, reading);
                    }
                }
            });

            if let Some(close) = result.last_close {
                self.inner.latest_prices.write().insert(result.id.clone(), close);
                self.inner.control.write().current_price = Some(close);
            }
        }
    }

    /// Price history and ranking over this cycle's 1m closes
    pub(crate) fn update_rankings(&self, cycle_prices: &HashMap<String, f64>, now: DateTime<Utc>) {
        let mut tracker = self.inner.tracker.lock();
        self.inner.registry.with_all_mut(|instruments| {
            for instrument in instruments.iter_mut() {
                if tracker.config().is_top_tier(instrument.confidence) {
                    if let Some(price) = cycle_prices.get(&instrument.id) {
                        tracker.record_price(instrument, *price, now);
                    }
                } else {
                    instrument.current_price = None;
                    instrument.price_drop_pct = None;
                }
            }
            tracker.prune(now);
            tracker.rank(instruments);
        });
    }

    /// Run the confluence rule against the current registry
    pub(crate) fn detect(&self, now: DateTime<Utc>) -> Option<ConfluenceSignal> {
        let (running, position_open) = {
            let control = self.inner.control.read();
            (control.running, control.position.is_some())
        };
        self.inner.registry.with_all(|instruments| {
            self.inner
                .detector
                .scan(instruments, running, position_open, now)
        })
    }

    /// Close the open position if its duration has elapsed
    pub(crate) async fn settle_expired_position(
        &self,
        now: DateTime<Utc>,
    ) -> Option<ClosedPosition> {
        let position = {
            let mut control = self.inner.control.write();
            let expired = control
                .position
                .as_ref()
                .is_some_and(|position| position.is_expired(now));
            if expired {
                control.position.take()
            } else {
                None
            }
        }?;

        let exit_price = self
            .inner
            .latest_prices
            .read()
            .get(&position.instrument)
            .copied()
            .unwrap_or(position.entry_price);
        let closed = position.close(exit_price, self.inner.config.position.payout_ratio, now);

        let update = TradeUpdate {
            exit_price: Decimal::from_f64(closed.exit_price),
            result: Some(closed.result),
            pnl: Decimal::from_f64(closed.pnl),
        };
        match self.inner.store.update_trade(closed.position.trade_id, update).await {
            Ok(Some(_)) => {}
            Ok(None) => warn!(trade = %closed.position.trade_id, "Closed trade missing from store"),
            Err(e) => warn!(
                trade = %closed.position.trade_id,
                "Failed to record trade result: {}", e
            ),
        }

        self.inner.metrics.increment_closed();
        info!(
            instrument = %closed.position.instrument,
            direction = %closed.position.direction,
            entry = closed.position.entry_price,
            exit = closed.exit_price,
            result = ?closed.result,
            "Position closed"
        );
        self.inner
            .publisher
            .broadcast(EngineEvent::PositionClosed(closed.clone()))
            .await;
        Some(closed)
    }

    /// Open a position on `signal` unless the engine stopped or one is already open
    pub(crate) async fn open_position(
        &self,
        signal: &ConfluenceSignal,
        now: DateTime<Utc>,
    ) -> Option<OpenPosition> {
        let latest = self.inner.latest_prices.read().get(&signal.instrument).copied();
        let Some(entry_price) = latest else {
            warn!(
                instrument = %signal.instrument,
                "No price for signalled instrument, position not opened"
            );
            return None;
        };

        let settings = &self.inner.config.position;
        let position = OpenPosition {
            trade_id: Uuid::new_v4(),
            instrument: signal.instrument.clone(),
            direction: TradeDirection::from(signal.direction),
            amount: settings.amount,
            entry_price,
            opened_at: now,
            duration_secs: settings.duration_secs,
            confidence: signal.confidence,
        };

        {
            let mut control = self.inner.control.write();
            if !control.running || control.position.is_some() {
                return None;
            }
            control.position = Some(position.clone());
        }

        let trade = NewTrade {
            id: position.trade_id,
            instrument: position.instrument.clone(),
            direction: position.direction,
            amount: Decimal::from_f64(position.amount).unwrap_or(Decimal::ZERO),
            duration_secs: position.duration_secs,
            entry_price: Decimal::from_f64(position.entry_price),
            signal: Some(format!("{0}/{0}/{0}", signal.direction)),
        };
        if let Err(e) = self.inner.store.create_trade(trade).await {
            warn!(trade = %position.trade_id, "Failed to record opened trade: {}", e);
        }

        self.inner.metrics.increment_opened();
        info!(
            instrument = %position.instrument,
            direction = %position.direction,
            entry = position.entry_price,
            "Position opened"
        );
        self.inner
            .publisher
            .broadcast(EngineEvent::PositionOpened(position.clone()))
            .await;
        Some(position)
    }

    /// Fetch all three series for one instrument and compute SAR on each
    pub async fn self_test(&self, instrument: &str) -> Result<[Option<SarState>; 3]> {
        let (m1, m5, m15) = tokio::join!(
            fetch_series(self, instrument, Timeframe::M1),
            fetch_series(self, instrument, Timeframe::M5),
            fetch_series(self, instrument, Timeframe::M15),
        );

        let mut states = [None; 3];
        for (slot, (timeframe, candles)) in states
            .iter_mut()
            .zip(Timeframe::ALL.into_iter().zip([m1?, m5?, m15?]))
        {
            *slot = self.inner.sar.calculate(&candles);
            match slot {
                Some(state) => info!(
                    instrument,
                    %timeframe,
                    candles = candles.len(),
                    direction = %state.direction,
                    stop = state.stop,
                    af = state.af,
                    "Self-test SAR"
                ),
                None => warn!(
                    instrument,
                    %timeframe,
                    candles = candles.len(),
                    "Self-test: insufficient candles"
                ),
            }
        }
        Ok(states)
    }

    /// Launch every background loop; they stop once `shutdown` flips to true
    pub fn spawn(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move { engine.run(shutdown).await })
    }

    /// Drive every background loop until shutdown
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        let scheduler = RefreshScheduler::new(self.clone());
        tokio::join!(
            scheduler.run(shutdown.clone()),
            self.drift_loop(shutdown.clone()),
            self.balance_loop(shutdown.clone()),
            self.self_test_once(shutdown),
        );
        info!("Confluence engine background tasks finished");
    }

    async fn drift_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.inner.config.readiness.drift_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => self.drift_confidence(),
                _ = wait_for_shutdown(&mut shutdown) => break,
            }
        }
        debug!("Confidence drift loop stopped");
    }

    async fn balance_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.inner.config.account.balance_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => self.refresh_balance().await,
                _ = wait_for_shutdown(&mut shutdown) => break,
            }
        }
        debug!("Balance loop stopped");
    }

    async fn self_test_once(&self, mut shutdown: watch::Receiver<bool>) {
        let scheduler = &self.inner.config.scheduler;
        let instrument = match &scheduler.self_test_instrument {
            Some(id) => id.clone(),
            None => match self.inner.registry.catalog().first() {
                Some(spec) => spec.id.clone(),
                None => return,
            },
        };

        tokio::select! {
            _ = tokio::time::sleep(scheduler.self_test_delay()) => {}
            _ = wait_for_shutdown(&mut shutdown) => return,
        }

        info!(instrument = %instrument, "Running SAR self-test");
        if let Err(e) = self.self_test(&instrument).await {
            warn!(instrument = %instrument, "SAR self-test failed: {}", e);
        }
    }

    /// Instruments by id, for tests and tooling
    pub fn instrument(&self, id: &str) -> Option<InstrumentState> {
        self.inner.registry.get(id)
    }

    /// Retained price history of one instrument, oldest first
    pub fn price_history(&self, id: &str) -> Vec<PriceEntry> {
        self.inner
            .tracker
            .lock()
            .history(id)
            .map(|history| history.iter().copied().collect())
            .unwrap_or_default()
    }
}

/// Resolves once the shutdown flag is set or its sender is gone
pub(crate) async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
