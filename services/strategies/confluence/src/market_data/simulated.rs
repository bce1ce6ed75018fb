//! In-process random-walk candle generator
//!
//! Series are cached per (instrument, timeframe). The first fetch generates a
//! full window ending now; every later fetch rolls the window forward by one
//! bar so readings evolve between cycles.

use super::{AccountInfo, MarketDataProvider, Result};
use crate::types::{Candle, Timeframe};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

pub struct SimulatedMarketData {
    series: Mutex<HashMap<(String, Timeframe), Vec<Candle>>>,
    rng: Mutex<StdRng>,
    balance: f64,
    account: AccountInfo,
}

impl SimulatedMarketData {
    pub fn new(account: AccountInfo, balance: f64) -> Self {
        Self::with_rng(account, balance, StdRng::from_entropy())
    }

    pub fn with_seed(account: AccountInfo, balance: f64, seed: u64) -> Self {
        Self::with_rng(account, balance, StdRng::seed_from_u64(seed))
    }

    fn with_rng(account: AccountInfo, balance: f64, rng: StdRng) -> Self {
        Self {
            series: Mutex::new(HashMap::new()),
            rng: Mutex::new(rng),
            balance,
            account,
        }
    }

    /// Number of cached series
    pub fn cached(&self) -> usize {
        self.series.lock().len()
    }
}

fn next_bar(rng: &mut StdRng, timestamp: i64, base: f64) -> Candle {
    let scale = base * 0.005;
    let open = (base + rng.gen_range(-scale..=scale)).max(0.0001);
    let close = (open + rng.gen_range(-2.0 * scale..=2.0 * scale)).max(0.0001);
    let high = open.max(close) + rng.gen_range(0.0..=scale);
    let low = (open.min(close) - rng.gen_range(0.0..=scale)).max(0.00005);
    Candle::new(timestamp, open, high, low, close)
}

#[async_trait]
impl MarketDataProvider for SimulatedMarketData {
    async fn fetch_candles(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Candle>> {
        let step_ms = timeframe.seconds() * 1_000;
        let now_ms = Utc::now().timestamp_millis();

        let mut rng = self.rng.lock();
        let mut series = self.series.lock();
        let window = series
            .entry((instrument.to_string(), timeframe))
            .or_default();

        if window.is_empty() {
            let mut base = rng.gen_range(100.0..10_000.0);
            for i in (1..=count as i64).rev() {
                let bar = next_bar(&mut rng, now_ms - step_ms * i, base);
                base = bar.close;
                window.push(bar);
            }
        } else if let Some(last) = window.last().copied() {
            window.push(next_bar(&mut rng, last.timestamp + step_ms, last.close));
            if window.len() > count {
                let excess = window.len() - count;
                window.drain(..excess);
            }
        }

        Ok(window.clone())
    }

    async fn balance(&self) -> Result<f64> {
        Ok(self.balance)
    }

    async fn account_info(&self) -> Result<AccountInfo> {
        Ok(self.account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> SimulatedMarketData {
        SimulatedMarketData::with_seed(
            AccountInfo {
                account_id: 7,
                is_demo: true,
            },
            5.30,
            11,
        )
    }

    #[tokio::test]
    async fn test_generates_ordered_window() {
        let provider = provider();
        let candles = provider
            .fetch_candles("BNB OTC", Timeframe::M5, 50)
            .await
            .unwrap();

        assert_eq!(candles.len(), 50);
        for pair in candles.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, 300_000);
        }
        for candle in &candles {
            assert!(candle.low <= candle.open.min(candle.close));
            assert!(candle.high >= candle.open.max(candle.close));
        }
    }

    #[tokio::test]
    async fn test_window_rolls_forward() {
        let provider = provider();
        let first = provider
            .fetch_candles("BNB OTC", Timeframe::M1, 50)
            .await
            .unwrap();
        let second = provider
            .fetch_candles("BNB OTC", Timeframe::M1, 50)
            .await
            .unwrap();

        assert_eq!(second.len(), 50);
        assert_eq!(second[0], first[1]);
        assert_eq!(second[49].timestamp, first[49].timestamp + 60_000);
        assert_eq!(provider.cached(), 1);
    }

    #[tokio::test]
    async fn test_account_values() {
        let provider = provider();
        assert_eq!(provider.balance().await.unwrap(), 5.30);
        assert_eq!(provider.account_info().await.unwrap().account_id, 7);
    }
}
