//! Memory tier plus optional durable tier
//!
//! Writes always land in memory and are then attempted on the durable tier.
//! Reads prefer the durable tier; an error, or a missing record, falls back to
//! memory. Records read from the durable tier refresh the memory tier.
//!
//! A trade whose latest durable write failed is marked unsynced. For those the
//! memory copy is authoritative until a later durable write succeeds.

use super::{
    newest_first, DurableBackend, MemoryTier, NewTrade, Result, TradeRecord, TradeStats,
    TradeStore, TradeUpdate,
};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashSet;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

pub struct TieredTradeStore {
    memory: MemoryTier,
    durable: Option<Arc<dyn DurableBackend>>,
    /// Ids whose newest version never reached the durable tier
    unsynced: DashSet<Uuid>,
}

impl TieredTradeStore {
    pub fn new(durable: Option<Arc<dyn DurableBackend>>) -> Self {
        Self {
            memory: MemoryTier::new(),
            durable,
            unsynced: DashSet::new(),
        }
    }

    pub fn memory_only() -> Self {
        Self::new(None)
    }

    pub fn memory(&self) -> &MemoryTier {
        &self.memory
    }

    pub fn is_unsynced(&self, id: Uuid) -> bool {
        self.unsynced.contains(&id)
    }

    async fn persist(&self, record: &TradeRecord) {
        if let Some(durable) = &self.durable {
            match durable.put(record).await {
                Ok(()) => {
                    self.unsynced.remove(&record.id);
                }
                Err(e) => {
                    warn!(trade = %record.id, "Durable write failed, kept in memory: {}", e);
                    self.unsynced.insert(record.id);
                }
            }
        }
    }

    /// Every known trade; unsynced trades come from memory
    async fn read_all(&self) -> Vec<TradeRecord> {
        if let Some(durable) = &self.durable {
            match durable.all().await {
                Ok(records) => {
                    let mut merged: Vec<TradeRecord> = records
                        .into_iter()
                        .filter(|record| !self.unsynced.contains(&record.id))
                        .collect();
                    let durable_ids: HashSet<Uuid> =
                        merged.iter().map(|record| record.id).collect();
                    merged.extend(
                        self.memory
                            .all()
                            .into_iter()
                            .filter(|record| !durable_ids.contains(&record.id)),
                    );
                    return merged;
                }
                Err(e) => warn!("Durable read failed, using memory tier: {}", e),
            }
        }
        self.memory.all()
    }
}

#[async_trait]
impl TradeStore for TieredTradeStore {
    async fn create_trade(&self, trade: NewTrade) -> Result<TradeRecord> {
        let record = trade.into_record(Utc::now());
        self.memory.insert(record.clone());
        self.persist(&record).await;
        Ok(record)
    }

    async fn update_trade(&self, id: Uuid, update: TradeUpdate) -> Result<Option<TradeRecord>> {
        let Some(mut record) = self.get_trade(id).await? else {
            return Ok(None);
        };

        update.apply(&mut record);
        self.memory.insert(record.clone());
        self.persist(&record).await;
        Ok(Some(record))
    }

    async fn get_trade(&self, id: Uuid) -> Result<Option<TradeRecord>> {
        if self.unsynced.contains(&id) {
            return Ok(self.memory.get(id));
        }

        if let Some(durable) = &self.durable {
            match durable.get(id).await {
                Ok(Some(record)) => {
                    self.memory.insert(record.clone());
                    return Ok(Some(record));
                }
                Ok(None) => {}
                Err(e) => warn!(trade = %id, "Durable read failed, using memory tier: {}", e),
            }
        }
        Ok(self.memory.get(id))
    }

    async fn recent_trades(&self, limit: usize) -> Result<Vec<TradeRecord>> {
        Ok(newest_first(self.read_all().await, limit))
    }

    async fn stats(&self) -> Result<TradeStats> {
        Ok(TradeStats::from_records(&self.read_all().await))
    }
}
