//! Simulated fixed-duration positions opened on confluence

use crate::types::Direction;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    Call,
    Put,
}

impl From<Direction> for TradeDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Long => TradeDirection::Call,
            Direction::Short => TradeDirection::Put,
        }
    }
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeDirection::Call => f.write_str("call"),
            TradeDirection::Put => f.write_str("put"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeResult {
    Pending,
    Win,
    Loss,
}

/// A call wins iff price rose, a put wins iff price fell
pub fn trade_result(direction: TradeDirection, entry: f64, exit: f64) -> TradeResult {
    let won = match direction {
        TradeDirection::Call => exit > entry,
        TradeDirection::Put => exit < entry,
    };
    if won {
        TradeResult::Win
    } else {
        TradeResult::Loss
    }
}

/// The single open position, as shown in snapshots
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPosition {
    #[serde(rename = "id")]
    pub trade_id: Uuid,
    #[serde(rename = "asset")]
    pub instrument: String,
    pub direction: TradeDirection,
    pub amount: f64,
    pub entry_price: f64,
    #[serde(rename = "startTime")]
    pub opened_at: DateTime<Utc>,
    #[serde(rename = "duration")]
    pub duration_secs: u64,
    pub confidence: f64,
}

impl OpenPosition {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.opened_at + Duration::seconds(self.duration_secs as i64)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// Settle at `exit_price`; pnl is `amount * payout_ratio` on a win and `-amount` on a loss
    pub fn close(self, exit_price: f64, payout_ratio: f64, now: DateTime<Utc>) -> ClosedPosition {
        let result = trade_result(self.direction, self.entry_price, exit_price);
        let pnl = match result {
            TradeResult::Win => self.amount * payout_ratio,
            _ => -self.amount,
        };

        ClosedPosition {
            position: self,
            exit_price,
            result,
            pnl,
            closed_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedPosition {
    #[serde(flatten)]
    pub position: OpenPosition,
    pub exit_price: f64,
    pub result: TradeResult,
    pub pnl: f64,
    pub closed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(direction: TradeDirection) -> OpenPosition {
        OpenPosition {
            trade_id: Uuid::new_v4(),
            instrument: "BNB OTC".to_string(),
            direction,
            amount: 1.0,
            entry_price: 100.0,
            opened_at: Utc::now(),
            duration_secs: 60,
            confidence: 92.0,
        }
    }

    #[test]
    fn test_trade_result_rules() {
        assert_eq!(trade_result(TradeDirection::Call, 100.0, 101.0), TradeResult::Win);
        assert_eq!(trade_result(TradeDirection::Call, 100.0, 100.0), TradeResult::Loss);
        assert_eq!(trade_result(TradeDirection::Put, 100.0, 99.0), TradeResult::Win);
        assert_eq!(trade_result(TradeDirection::Put, 100.0, 100.0), TradeResult::Loss);
    }

    #[test]
    fn test_direction_mapping() {
        assert_eq!(TradeDirection::from(Direction::Long), TradeDirection::Call);
        assert_eq!(TradeDirection::from(Direction::Short), TradeDirection::Put);
    }

    #[test]
    fn test_expiry_and_close() {
        let open = position(TradeDirection::Put);
        assert!(!open.is_expired(open.opened_at + Duration::seconds(59)));
        assert!(open.is_expired(open.opened_at + Duration::seconds(60)));

        let closed = open.clone().close(98.0, 0.92, open.expires_at());
        assert_eq!(closed.result, TradeResult::Win);
        assert!((closed.pnl - 0.92).abs() < 1e-12);

        let closed = open.close(101.0, 0.92, Utc::now());
        assert_eq!(closed.result, TradeResult::Loss);
        assert_eq!(closed.pnl, -1.0);
    }

    #[test]
    fn test_open_position_view() {
        let json = serde_json::to_value(position(TradeDirection::Call)).unwrap();
        assert_eq!(json["asset"], "BNB OTC");
        assert_eq!(json["direction"], "call");
        assert_eq!(json["entryPrice"], 100.0);
        assert_eq!(json["duration"], 60);
        assert!(json.get("startTime").is_some());
    }
}
