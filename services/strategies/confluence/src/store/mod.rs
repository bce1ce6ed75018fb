//! # Trade Store
//!
//! ## Purpose
//!
//! Persistence of simulated trades opened on confluence signals and the
//! win/loss statistics derived from them.
//!
//! ## Architecture Role
//!
//! ```text
//! engine ──► TieredTradeStore ──► MemoryTier   (always written)
//!                             └─► DurableBackend (best effort, preferred for reads)
//! ```
//!
//! Durable failures never surface to the engine: writes are logged and kept in
//! memory, reads fall back to memory. [`MemoryTier`] alone is also a complete
//! [`TradeStore`] for runs without a durable path.

pub mod file;
pub mod memory;
pub mod tiered;

pub use file::JsonlBackend;
pub use memory::MemoryTier;
pub use tiered::TieredTradeStore;

use crate::config::StoreConfig;
use crate::position::{TradeDirection, TradeResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store unavailable: {message}")]
    Unavailable { message: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Persisted trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    pub id: Uuid,
    pub occurred_at: DateTime<Utc>,
    #[serde(rename = "asset")]
    pub instrument: String,
    pub direction: TradeDirection,
    pub amount: Decimal,
    #[serde(rename = "durationSeconds")]
    pub duration_secs: u64,
    pub entry_price: Option<Decimal>,
    pub exit_price: Option<Decimal>,
    pub result: TradeResult,
    pub pnl: Option<Decimal>,
    /// Readings that triggered the trade, e.g. `"long/long/long"`
    pub signal: Option<String>,
}

/// Fields supplied when a trade is opened
#[derive(Debug, Clone)]
pub struct NewTrade {
    pub id: Uuid,
    pub instrument: String,
    pub direction: TradeDirection,
    pub amount: Decimal,
    pub duration_secs: u64,
    pub entry_price: Option<Decimal>,
    pub signal: Option<String>,
}

impl NewTrade {
    pub fn into_record(self, occurred_at: DateTime<Utc>) -> TradeRecord {
        TradeRecord {
            id: self.id,
            occurred_at,
            instrument: self.instrument,
            direction: self.direction,
            amount: self.amount,
            duration_secs: self.duration_secs,
            entry_price: self.entry_price,
            exit_price: None,
            result: TradeResult::Pending,
            pnl: None,
            signal: self.signal,
        }
    }
}

/// Partial update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct TradeUpdate {
    pub exit_price: Option<Decimal>,
    pub result: Option<TradeResult>,
    pub pnl: Option<Decimal>,
}

impl TradeUpdate {
    pub fn apply(&self, record: &mut TradeRecord) {
        if let Some(exit_price) = self.exit_price {
            record.exit_price = Some(exit_price);
        }
        if let Some(result) = self.result {
            record.result = result;
        }
        if let Some(pnl) = self.pnl {
            record.pnl = Some(pnl);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeStats {
    pub wins: u64,
    pub losses: u64,
    pub total: u64,
    /// Percentage of all trades won, one decimal place
    pub win_rate: f64,
}

impl TradeStats {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a TradeRecord>) -> Self {
        let mut stats = TradeStats::default();
        for record in records {
            stats.total += 1;
            match record.result {
                TradeResult::Win => stats.wins += 1,
                TradeResult::Loss => stats.losses += 1,
                TradeResult::Pending => {}
            }
        }

        if stats.total > 0 {
            let rate = stats.wins as f64 / stats.total as f64 * 100.0;
            stats.win_rate = (rate * 10.0).round() / 10.0;
        }
        stats
    }
}

/// Newest first, at most `limit`
pub(crate) fn newest_first(mut records: Vec<TradeRecord>, limit: usize) -> Vec<TradeRecord> {
    records.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
    records.truncate(limit);
    records
}

#[async_trait]
pub trait TradeStore: Send + Sync {
    async fn create_trade(&self, trade: NewTrade) -> Result<TradeRecord>;

    /// `Ok(None)` when no trade has `id`
    async fn update_trade(&self, id: Uuid, update: TradeUpdate) -> Result<Option<TradeRecord>>;

    async fn get_trade(&self, id: Uuid) -> Result<Option<TradeRecord>>;

    /// Most recent trades, newest first
    async fn recent_trades(&self, limit: usize) -> Result<Vec<TradeRecord>>;

    async fn stats(&self) -> Result<TradeStats>;
}

/// Slow, fallible tier behind the memory tier
#[async_trait]
pub trait DurableBackend: Send + Sync {
    /// Insert or replace by id
    async fn put(&self, record: &TradeRecord) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<TradeRecord>>;

    async fn all(&self) -> Result<Vec<TradeRecord>>;
}

/// Build the configured store; an unusable durable path leaves a memory-only store
pub async fn open_store(config: &StoreConfig) -> Arc<dyn TradeStore> {
    let Some(raw) = config.path.as_deref() else {
        info!("No trade store path configured, trades kept in memory");
        return Arc::new(TieredTradeStore::memory_only());
    };

    let path = match confluence_config::expand_path(raw) {
        Ok(path) => path,
        Err(e) => {
            warn!("Invalid trade store path {}: {:#}, trades kept in memory", raw, e);
            return Arc::new(TieredTradeStore::memory_only());
        }
    };

    match JsonlBackend::open(path).await {
        Ok(backend) => Arc::new(TieredTradeStore::new(Some(Arc::new(backend)))),
        Err(e) => {
            warn!("Trade store unavailable: {}, trades kept in memory", e);
            Arc::new(TieredTradeStore::memory_only())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(result: TradeResult) -> TradeRecord {
        NewTrade {
            id: Uuid::new_v4(),
            instrument: "BNB OTC".to_string(),
            direction: TradeDirection::Call,
            amount: dec!(1),
            duration_secs: 60,
            entry_price: Some(dec!(100)),
            signal: None,
        }
        .into_record(Utc::now())
        .with_result(result)
    }

    impl TradeRecord {
        fn with_result(mut self, result: TradeResult) -> Self {
            self.result = result;
            self
        }
    }

    #[test]
    fn test_stats_win_rate_rounding() {
        let records = vec![
            record(TradeResult::Win),
            record(TradeResult::Win),
            record(TradeResult::Loss),
        ];
        let stats = TradeStats::from_records(&records);
        assert_eq!(stats.wins, 2);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.win_rate, 66.7);

        assert_eq!(TradeStats::from_records(&Vec::new()).win_rate, 0.0);
    }

    #[test]
    fn test_update_leaves_unset_fields() {
        let mut trade = record(TradeResult::Pending);
        TradeUpdate {
            exit_price: Some(dec!(101.5)),
            ..TradeUpdate::default()
        }
        .apply(&mut trade);

        assert_eq!(trade.exit_price, Some(dec!(101.5)));
        assert_eq!(trade.result, TradeResult::Pending);
    }

    #[tokio::test]
    async fn test_open_store_without_path() {
        let config = StoreConfig {
            path: None,
            ..StoreConfig::default()
        };
        let store = open_store(&config).await;
        let trade = store.create_trade(NewTrade {
            id: Uuid::new_v4(),
            instrument: "BNB OTC".to_string(),
            direction: TradeDirection::Put,
            amount: dec!(1),
            duration_secs: 60,
            entry_price: None,
            signal: None,
        });
        assert_eq!(trade.await.unwrap().result, TradeResult::Pending);
        assert_eq!(store.stats().await.unwrap().total, 1);
    }

    #[test]
    fn test_record_wire_names() {
        let json = serde_json::to_value(record(TradeResult::Pending)).unwrap();
        assert_eq!(json["asset"], "BNB OTC");
        assert_eq!(json["durationSeconds"], 60);
        assert_eq!(json["result"], "pending");
        assert!(json.get("occurredAt").is_some());
    }
}
