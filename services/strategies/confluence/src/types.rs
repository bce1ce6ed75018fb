//! Core market and instrument types

use crate::config::ReadinessConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One OHLC bar, timestamp in Unix milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub timestamp: i64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            open,
            high,
            low,
            close,
            timestamp,
        }
    }
}

/// Candle granularity monitored per instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::M1, Timeframe::M5, Timeframe::M15];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
        }
    }

    pub fn seconds(&self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 300,
            Timeframe::M15 => 900,
        }
    }

    fn index(&self) -> usize {
        match self {
            Timeframe::M1 => 0,
            Timeframe::M5 => 1,
            Timeframe::M15 => 2,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trend direction reported by the SAR on one timeframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => f.write_str("long"),
            Direction::Short => f.write_str("short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Crypto,
    Forex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessStatus {
    Ready,
    Cooldown,
}

/// The three per-timeframe readings of one instrument. `None` means unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readings([Option<Direction>; 3]);

impl Readings {
    pub fn get(&self, timeframe: Timeframe) -> Option<Direction> {
        self.0[timeframe.index()]
    }

    pub fn set(&mut self, timeframe: Timeframe, reading: Option<Direction>) {
        self.0[timeframe.index()] = reading;
    }

    /// Direction shared by all three timeframes, if every reading is set and equal
    pub fn agreed(&self) -> Option<Direction> {
        let first = self.0[0]?;
        self.0[1..]
            .iter()
            .all(|reading| *reading == Some(first))
            .then_some(first)
    }
}

impl Serialize for Readings {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("Readings", 3)?;
        state.serialize_field("sar1m", &self.get(Timeframe::M1))?;
        state.serialize_field("sar5m", &self.get(Timeframe::M5))?;
        state.serialize_field("sar15m", &self.get(Timeframe::M15))?;
        state.end()
    }
}

/// Catalog entry, fixed at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    pub id: String,
    pub category: Category,
    /// Confidence the instrument starts with after a reset
    pub confidence: f64,
}

/// Live state of one monitored instrument, mutated in place every cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentState {
    pub id: String,
    pub category: Category,
    pub confidence: f64,
    pub status: ReadinessStatus,
    #[serde(flatten)]
    pub readings: Readings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_drop_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
}

impl InstrumentState {
    /// Fresh live state for a catalog entry, confidence clamped into range
    pub fn from_spec(spec: &InstrumentSpec, readiness: &ReadinessConfig) -> Self {
        let confidence = readiness.clamp(spec.confidence);
        let status = if confidence >= readiness.ready_threshold {
            ReadinessStatus::Ready
        } else {
            ReadinessStatus::Cooldown
        };

        Self {
            id: spec.id.clone(),
            category: spec.category,
            confidence,
            status,
            readings: Readings::default(),
            current_price: None,
            price_drop_pct: None,
            rank: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == ReadinessStatus::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readings_agreement() {
        let mut readings = Readings::default();
        assert_eq!(readings.agreed(), None);

        readings.set(Timeframe::M1, Some(Direction::Long));
        readings.set(Timeframe::M5, Some(Direction::Long));
        assert_eq!(readings.agreed(), None);

        readings.set(Timeframe::M15, Some(Direction::Long));
        assert_eq!(readings.agreed(), Some(Direction::Long));

        readings.set(Timeframe::M5, Some(Direction::Short));
        assert_eq!(readings.agreed(), None);
    }

    #[test]
    fn test_instrument_serializes_dashboard_shape() {
        let spec = InstrumentSpec {
            id: "BNB OTC".to_string(),
            category: Category::Crypto,
            confidence: 92.0,
        };
        let mut state = InstrumentState::from_spec(&spec, &ReadinessConfig::default());
        state.readings.set(Timeframe::M1, Some(Direction::Short));
        state.rank = Some(1);

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["id"], "BNB OTC");
        assert_eq!(json["status"], "ready");
        assert_eq!(json["sar1m"], "short");
        assert!(json["sar5m"].is_null());
        assert_eq!(json["rank"], 1);
        assert!(json.get("currentPrice").is_none());
    }

    #[test]
    fn test_from_spec_clamps_to_floor() {
        let spec = InstrumentSpec {
            id: "USD/JPY".to_string(),
            category: Category::Forex,
            confidence: 3.0,
        };
        let state = InstrumentState::from_spec(&spec, &ReadinessConfig::default());
        assert_eq!(state.confidence, 15.0);
        assert_eq!(state.status, ReadinessStatus::Cooldown);
    }
}
