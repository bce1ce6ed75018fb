//! Confluence detection
//!
//! A signal fires for the first instrument, in catalog order, whose confidence
//! reaches the ready threshold and whose three timeframe readings are all set
//! and equal. At most one signal per scan.

use crate::types::{Direction, InstrumentState};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfluenceSignal {
    pub instrument: String,
    pub direction: Direction,
    pub confidence: f64,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct ConfluenceDetector {
    ready_threshold: f64,
}

impl ConfluenceDetector {
    pub fn new(ready_threshold: f64) -> Self {
        Self { ready_threshold }
    }

    /// Evaluate the rule once; silent unless running with no open position
    pub fn scan(
        &self,
        instruments: &[InstrumentState],
        running: bool,
        position_open: bool,
        now: DateTime<Utc>,
    ) -> Option<ConfluenceSignal> {
        if !running || position_open {
            return None;
        }

        instruments
            .iter()
            .filter(|instrument| instrument.confidence >= self.ready_threshold)
            .find_map(|instrument| {
                instrument.readings.agreed().map(|direction| ConfluenceSignal {
                    instrument: instrument.id.clone(),
                    direction,
                    confidence: instrument.confidence,
                    detected_at: now,
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReadinessConfig;
    use crate::types::{Category, InstrumentSpec, Timeframe};
    use proptest::prelude::*;

    fn instrument(id: &str, confidence: f64, readings: [Option<Direction>; 3]) -> InstrumentState {
        let spec = InstrumentSpec {
            id: id.to_string(),
            category: Category::Crypto,
            confidence,
        };
        let mut state = InstrumentState::from_spec(&spec, &ReadinessConfig::default());
        for (timeframe, reading) in Timeframe::ALL.into_iter().zip(readings) {
            state.readings.set(timeframe, reading);
        }
        state
    }

    const LONG: Option<Direction> = Some(Direction::Long);
    const SHORT: Option<Direction> = Some(Direction::Short);

    #[test]
    fn test_first_agreeing_instrument_in_catalog_order() {
        let detector = ConfluenceDetector::new(88.0);
        let instruments = vec![
            instrument("low", 60.0, [LONG, LONG, LONG]),
            instrument("mixed", 92.0, [LONG, SHORT, LONG]),
            instrument("first", 88.0, [SHORT, SHORT, SHORT]),
            instrument("second", 92.0, [LONG, LONG, LONG]),
        ];

        let signal = detector.scan(&instruments, true, false, Utc::now()).unwrap();
        assert_eq!(signal.instrument, "first");
        assert_eq!(signal.direction, Direction::Short);
    }

    #[test]
    fn test_gated_by_running_and_position() {
        let detector = ConfluenceDetector::new(88.0);
        let instruments = vec![instrument("a", 92.0, [LONG, LONG, LONG])];

        assert!(detector.scan(&instruments, false, false, Utc::now()).is_none());
        assert!(detector.scan(&instruments, true, true, Utc::now()).is_none());
        assert!(detector.scan(&instruments, true, false, Utc::now()).is_some());
    }

    #[test]
    fn test_unset_reading_suppresses() {
        let detector = ConfluenceDetector::new(88.0);
        let instruments = vec![instrument("a", 92.0, [LONG, None, LONG])];
        assert!(detector.scan(&instruments, true, false, Utc::now()).is_none());
    }

    fn arb_reading() -> impl Strategy<Value = Option<Direction>> {
        prop_oneof![Just(None), Just(LONG), Just(SHORT)]
    }

    proptest! {
        #[test]
        fn prop_fires_iff_agreement(
            confidence in 15.0f64..=92.0,
            readings in [arb_reading(), arb_reading(), arb_reading()],
        ) {
            let detector = ConfluenceDetector::new(88.0);
            let instruments = vec![instrument("x", confidence, readings)];
            let agreed = readings[0].is_some()
                && readings[0] == readings[1]
                && readings[1] == readings[2];

            let fired = detector.scan(&instruments, true, false, Utc::now()).is_some();
            prop_assert_eq!(fired, confidence >= 88.0 && agreed);
        }
    }
}
