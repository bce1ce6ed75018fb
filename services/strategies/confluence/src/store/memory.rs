//! In-memory trade tier

use super::{newest_first, NewTrade, Result, TradeRecord, TradeStats, TradeStore, TradeUpdate};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

/// Concurrent map of trades keyed by id
#[derive(Debug, Default)]
pub struct MemoryTier {
    records: DashMap<Uuid, TradeRecord>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: TradeRecord) {
        self.records.insert(record.id, record);
    }

    pub fn get(&self, id: Uuid) -> Option<TradeRecord> {
        self.records.get(&id).map(|entry| entry.clone())
    }

    /// Apply `update` in place and return the updated record
    pub fn update(&self, id: Uuid, update: &TradeUpdate) -> Option<TradeRecord> {
        let mut entry = self.records.get_mut(&id)?;
        update.apply(entry.value_mut());
        Some(entry.clone())
    }

    pub fn all(&self) -> Vec<TradeRecord> {
        self.records
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl TradeStore for MemoryTier {
    async fn create_trade(&self, trade: NewTrade) -> Result<TradeRecord> {
        let record = trade.into_record(Utc::now());
        self.insert(record.clone());
        Ok(record)
    }

    async fn update_trade(&self, id: Uuid, update: TradeUpdate) -> Result<Option<TradeRecord>> {
        Ok(self.update(id, &update))
    }

    async fn get_trade(&self, id: Uuid) -> Result<Option<TradeRecord>> {
        Ok(self.get(id))
    }

    async fn recent_trades(&self, limit: usize) -> Result<Vec<TradeRecord>> {
        Ok(newest_first(self.all(), limit))
    }

    async fn stats(&self) -> Result<TradeStats> {
        Ok(TradeStats::from_records(&self.all()))
    }
}
