//! Point-in-time engine state and the events carrying it

use crate::market_data::AccountInfo;
use crate::metrics::MetricsSnapshot;
use crate::position::{ClosedPosition, OpenPosition};
use crate::store::{TradeRecord, TradeStats};
use crate::types::InstrumentState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Immutable copy of the engine state, built once per publish
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotState {
    pub running: bool,
    pub connected: bool,
    pub balance: f64,
    /// Last 1m close written by the most recent cycle
    pub current_price: Option<f64>,
    #[serde(rename = "monitoredAssets")]
    pub instruments: Vec<InstrumentState>,
    #[serde(rename = "currentTrade")]
    pub current_position: Option<OpenPosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_info: Option<AccountInfo>,
    pub generated_at: DateTime<Utc>,
}

impl BotState {
    pub fn ready_count(&self) -> usize {
        self.instruments.iter().filter(|i| i.is_ready()).count()
    }
}

/// Snapshot plus trade history and counters
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    #[serde(flatten)]
    pub state: BotState,
    pub stats: TradeStats,
    pub trades: Vec<TradeRecord>,
    pub metrics: MetricsSnapshot,
}

/// Everything the engine publishes to subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum EngineEvent {
    #[serde(rename = "state")]
    State(Arc<BotState>),
    #[serde(rename = "trade-started")]
    PositionOpened(OpenPosition),
    #[serde(rename = "trade-completed")]
    PositionClosed(ClosedPosition),
}

impl EngineEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::State(_) => "state",
            EngineEvent::PositionOpened(_) => "trade-started",
            EngineEvent::PositionClosed(_) => "trade-completed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_event_envelope() {
        let state = BotState {
            running: true,
            connected: true,
            balance: 5.3,
            current_price: Some(3625.42),
            instruments: Vec::new(),
            current_position: None,
            account_info: Some(AccountInfo {
                account_id: 42,
                is_demo: true,
            }),
            generated_at: Utc::now(),
        };

        let json = serde_json::to_value(EngineEvent::State(Arc::new(state))).unwrap();
        assert_eq!(json["type"], "state");
        assert_eq!(json["data"]["running"], true);
        assert_eq!(json["data"]["currentPrice"], 3625.42);
        assert!(json["data"]["currentTrade"].is_null());
        assert_eq!(json["data"]["accountInfo"]["accountId"], 42);
        assert!(json["data"]["monitoredAssets"].as_array().unwrap().is_empty());
    }
}
