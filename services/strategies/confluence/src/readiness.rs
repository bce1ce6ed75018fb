//! # Readiness Tracker
//!
//! ## Purpose
//!
//! Hysteresis between the `ready` and `cooldown` states, the rolling price
//! history of top-tier instruments, and the drop-ranking over the ready
//! top tier.
//!
//! ## Architecture Role
//!
//! ```text
//! drift tick ──► apply_confidence() ──► status / hold window
//! cycle      ──► record_price()     ──► history / drop %
//!            └─► rank()             ──► dense ranks 1..K
//! ```
//!
//! A promotion from cooldown to ready opens a hold window. While the window is
//! open the instrument is forced ready and its confidence is pinned at the top
//! tier no matter what the confidence source reports. Once it closes the
//! instrument follows its threshold again.

use crate::config::ReadinessConfig;
use crate::types::{InstrumentState, ReadinessStatus};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// One observation in an instrument's rolling price history
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceEntry {
    pub at: DateTime<Utc>,
    pub price: f64,
}

#[derive(Debug)]
pub struct ReadinessTracker {
    config: ReadinessConfig,
    /// Last cooldown -> ready promotion per instrument
    promotions: HashMap<String, DateTime<Utc>>,
    history: HashMap<String, VecDeque<PriceEntry>>,
}

impl ReadinessTracker {
    pub fn new(config: ReadinessConfig) -> Self {
        Self {
            config,
            promotions: HashMap::new(),
            history: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ReadinessConfig {
        &self.config
    }

    /// Forget all holds and history, then open a hold window for every
    /// instrument currently at the top tier
    pub fn seed(&mut self, instruments: &[InstrumentState], now: DateTime<Utc>) {
        self.promotions.clear();
        self.history.clear();

        for instrument in instruments {
            if self.config.is_top_tier(instrument.confidence) {
                self.promotions.insert(instrument.id.clone(), now);
            }
        }

        debug!(holds = self.promotions.len(), "Readiness tracker seeded");
    }

    /// Whether `id` is inside its ready-hold window at `now`
    pub fn in_hold(&self, id: &str, now: DateTime<Utc>) -> bool {
        self.promotions
            .get(id)
            .is_some_and(|promoted| now - *promoted < self.config.hold())
    }

    pub fn promoted_at(&self, id: &str) -> Option<DateTime<Utc>> {
        self.promotions.get(id).copied()
    }

    /// Apply a raw confidence score with clamping and hysteresis
    pub fn apply_confidence(
        &mut self,
        instrument: &mut InstrumentState,
        raw: f64,
        now: DateTime<Utc>,
    ) {
        if self.in_hold(&instrument.id, now) {
            instrument.confidence = self.config.top_tier;
            instrument.status = ReadinessStatus::Ready;
            return;
        }

        let confidence = self.config.clamp(raw);
        let status = if confidence >= self.config.ready_threshold {
            ReadinessStatus::Ready
        } else {
            ReadinessStatus::Cooldown
        };

        if status == ReadinessStatus::Ready && instrument.status != ReadinessStatus::Ready {
            debug!(instrument = %instrument.id, confidence, "Promoted to ready");
            self.promotions.insert(instrument.id.clone(), now);
        }

        instrument.confidence = confidence;
        instrument.status = status;
    }

    /// Record a price observation for a top-tier instrument and refresh its drop %
    pub fn record_price(
        &mut self,
        instrument: &mut InstrumentState,
        price: f64,
        now: DateTime<Utc>,
    ) {
        let history = self.history.entry(instrument.id.clone()).or_default();

        match history.back_mut() {
            // Keep timestamps strictly increasing
            Some(last) if last.at >= now => last.price = price,
            _ => history.push_back(PriceEntry { at: now, price }),
        }

        let cutoff = now - self.config.retention();
        while history.front().is_some_and(|entry| entry.at < cutoff) {
            history.pop_front();
        }

        let drop_pct = match history.front() {
            Some(oldest) if history.len() >= 2 && oldest.price != 0.0 => {
                (oldest.price - price) / oldest.price * 100.0
            }
            _ => 0.0,
        };

        instrument.current_price = Some(price);
        instrument.price_drop_pct = Some(drop_pct);
    }

    /// Drop entries older than the retention window from every history,
    /// including instruments that no longer record prices
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.config.retention();
        self.history.retain(|_, history| {
            while history.front().is_some_and(|entry| entry.at < cutoff) {
                history.pop_front();
            }
            !history.is_empty()
        });
    }

    /// Price history of one instrument, oldest first
    pub fn history(&self, id: &str) -> Option<&VecDeque<PriceEntry>> {
        self.history.get(id)
    }

    /// Assign dense ranks over the ready top tier, largest drop first
    pub fn rank(&self, instruments: &mut [InstrumentState]) {
        for instrument in instruments.iter_mut() {
            instrument.rank = None;
        }

        let mut ranked: Vec<usize> = instruments
            .iter()
            .enumerate()
            .filter(|(_, instrument)| {
                instrument.is_ready() && self.config.is_top_tier(instrument.confidence)
            })
            .map(|(i, _)| i)
            .collect();

        // sort_by is stable: equal drops keep catalog order
        ranked.sort_by(|a, b| {
            let drop_a = instruments[*a].price_drop_pct.unwrap_or(0.0);
            let drop_b = instruments[*b].price_drop_pct.unwrap_or(0.0);
            drop_b.total_cmp(&drop_a)
        });

        for (position, i) in ranked.into_iter().enumerate() {
            instruments[i].rank = Some(position as u32 + 1);
        }
    }
}
