//! Engine counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Thread-safe counters shared by the scheduler and the engine
#[derive(Debug)]
pub struct EngineMetrics {
    start_time: Instant,
    cycles_completed: AtomicU64,
    cycles_skipped: AtomicU64,
    fetch_failures: AtomicU64,
    signals_emitted: AtomicU64,
    positions_opened: AtomicU64,
    positions_closed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub cycles_completed: u64,
    pub cycles_skipped: u64,
    pub fetch_failures: u64,
    pub signals_emitted: u64,
    pub positions_opened: u64,
    pub positions_closed: u64,
    pub uptime_secs: u64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            cycles_completed: AtomicU64::new(0),
            cycles_skipped: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
            signals_emitted: AtomicU64::new(0),
            positions_opened: AtomicU64::new(0),
            positions_closed: AtomicU64::new(0),
        }
    }

    pub fn increment_cycles(&self) {
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_skipped(&self) {
        self.cycles_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_fetch_failures(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_signals(&self) {
        self.signals_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_opened(&self) {
        self.positions_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_closed(&self) {
        self.positions_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            cycles_skipped: self.cycles_skipped.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            signals_emitted: self.signals_emitted.load(Ordering::Relaxed),
            positions_opened: self.positions_opened.load(Ordering::Relaxed),
            positions_closed: self.positions_closed.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
