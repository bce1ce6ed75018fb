//! # Refresh Scheduler
//!
//! ## Purpose
//!
//! Periodic, non-overlapping refresh cycles. A tick starts a cycle only while
//! the scheduler is idle; a tick that arrives mid-cycle is dropped, never
//! queued.
//!
//! ## Architecture Role
//!
//! ```text
//! tick ─► [batch 1: N instruments × 3 timeframes, concurrent] ─► write back
//!      ─► [batch 2 ...]                                        ─► write back
//!      ─► price history + ranking ─► settle expiry ─► detect ─► publish
//! ```
//!
//! Batches run one after another; inside a batch every instrument fetches its
//! three candle series concurrently, each bounded by the fetch timeout. A
//! failed or timed-out fetch leaves that timeframe's reading untouched and
//! never aborts the cycle. Each cycle runs in its own task so a panic is
//! logged and the next tick still fires.

use crate::engine::{wait_for_shutdown, ConfluenceEngine};
use crate::market_data::MarketDataError;
use crate::signals::ConfluenceSignal;
use crate::types::{Candle, Direction, Timeframe};
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Cycling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Started,
    Skipped,
}

/// What a refresh does to one timeframe reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingUpdate {
    /// Fetch failed; the previous reading stands
    Keep,
    /// Replace with this reading; `None` means insufficient data
    Set(Option<Direction>),
}

/// Result of refreshing one instrument, computed without any registry lock
#[derive(Debug, Clone)]
pub struct RefreshedInstrument {
    pub id: String,
    pub readings: [ReadingUpdate; 3],
    /// Close of the newest 1m candle
    pub last_close: Option<f64>,
    pub failures: usize,
}

/// Summary of one completed cycle
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub instruments: usize,
    pub batches: usize,
    pub fetch_failures: usize,
    pub signal: Option<ConfluenceSignal>,
}

/// Resets the cycling flag however the cycle ends
struct CycleGuard(Arc<AtomicBool>);

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct RefreshScheduler {
    engine: ConfluenceEngine,
    cycling: Arc<AtomicBool>,
    in_flight: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
    pub fn new(engine: ConfluenceEngine) -> Self {
        Self {
            engine,
            cycling: Arc::new(AtomicBool::new(false)),
            in_flight: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.cycling.load(Ordering::Acquire) {
            SchedulerState::Cycling
        } else {
            SchedulerState::Idle
        }
    }

    /// Start a cycle if idle, otherwise drop the tick
    pub fn tick(&self) -> TickOutcome {
        if self
            .cycling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.engine.metrics().increment_skipped();
            debug!("Refresh cycle still in flight, tick skipped");
            return TickOutcome::Skipped;
        }

        let guard = CycleGuard(self.cycling.clone());
        let engine = self.engine.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            let cycle = tokio::spawn(async move { run_cycle(&engine).await });
            match cycle.await {
                Ok(report) => debug!(
                    instruments = report.instruments,
                    failures = report.fetch_failures,
                    signal = report.signal.is_some(),
                    "Refresh cycle complete"
                ),
                Err(e) => error!("Refresh cycle aborted: {}", e),
            }
        });

        *self.in_flight.lock() = Some(handle);
        TickOutcome::Started
    }

    /// Wait for the in-flight cycle, if any
    pub async fn wait_idle(&self) {
        let handle = self.in_flight.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Refresh cycle task failed: {}", e);
            }
        }
    }

    /// Tick on the configured period until shutdown, then drain
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.engine.config().scheduler.cycle_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            period_ms = self.engine.config().scheduler.cycle_interval_ms,
            "Refresh scheduler started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick();
                }
                _ = wait_for_shutdown(&mut shutdown) => break,
            }
        }

        self.wait_idle().await;
        info!("Refresh scheduler stopped");
    }
}

/// One full refresh cycle over every instrument
pub async fn run_cycle(engine: &ConfluenceEngine) -> CycleReport {
    let batch_size = engine.config().scheduler.batch_size.max(1);
    let ids = engine.registry().ids();
    let mut report = CycleReport {
        instruments: ids.len(),
        ..CycleReport::default()
    };
    let mut cycle_prices = HashMap::new();

    for batch in ids.chunks(batch_size) {
        let refreshed = join_all(batch.iter().map(|id| refresh_instrument(engine, id))).await;

        engine.apply_refresh(&refreshed);
        for result in refreshed {
            report.fetch_failures += result.failures;
            if let Some(close) = result.last_close {
                cycle_prices.insert(result.id, close);
            }
        }
        report.batches += 1;
    }

    let now = engine.now();
    engine.update_rankings(&cycle_prices, now);
    engine.settle_expired_position(now).await;

    if let Some(signal) = engine.detect(now) {
        engine.metrics().increment_signals();
        info!(
            instrument = %signal.instrument,
            direction = %signal.direction,
            confidence = signal.confidence,
            "SAR confluence detected"
        );
        engine.open_position(&signal, now).await;
        report.signal = Some(signal);
    }

    engine.publish_state().await;
    engine.metrics().increment_cycles();
    report
}

/// Fetch one series, bounded by the configured fetch timeout
pub(crate) async fn fetch_series(
    engine: &ConfluenceEngine,
    instrument: &str,
    timeframe: Timeframe,
) -> Result<Vec<Candle>, MarketDataError> {
    let scheduler = &engine.config().scheduler;
    let fetch = engine
        .provider()
        .fetch_candles(instrument, timeframe, scheduler.candle_count);

    match tokio::time::timeout(scheduler.fetch_timeout(), fetch).await {
        Ok(result) => result,
        Err(_) => Err(MarketDataError::Timeout {
            instrument: instrument.to_string(),
            timeframe,
            timeout_ms: scheduler.fetch_timeout_ms,
        }),
    }
}

/// Fetch and compute all three timeframes for one instrument
async fn refresh_instrument(engine: &ConfluenceEngine, id: &str) -> RefreshedInstrument {
    let (m1, m5, m15) = tokio::join!(
        fetch_series(engine, id, Timeframe::M1),
        fetch_series(engine, id, Timeframe::M5),
        fetch_series(engine, id, Timeframe::M15),
    );

    let mut refreshed = RefreshedInstrument {
        id: id.to_string(),
        readings: [ReadingUpdate::Keep; 3],
        last_close: None,
        failures: 0,
    };

    for (i, (timeframe, result)) in Timeframe::ALL.into_iter().zip([m1, m5, m15]).enumerate() {
        refreshed.readings[i] = match result {
            Ok(candles) if candles.is_empty() => {
                warn!(instrument = id, %timeframe, "No candles returned");
                ReadingUpdate::Keep
            }
            Ok(candles) => {
                if timeframe == Timeframe::M1 {
                    refreshed.last_close = candles.last().map(|candle| candle.close);
                }
                ReadingUpdate::Set(engine.sar().reading(&candles))
            }
            Err(e) => {
                engine.metrics().increment_fetch_failures();
                refreshed.failures += 1;
                warn!(instrument = id, %timeframe, "Candle fetch failed: {}", e);
                ReadingUpdate::Keep
            }
        };
    }

    debug!(
        instrument = id,
        readings = ?refreshed.readings,
        "Instrument refreshed"
    );
    refreshed
}
