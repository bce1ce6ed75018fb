//! Parabolic stop-and-reverse indicator
//!
//! Recomputed from the full candle window on every cycle; no state is carried
//! between calls, so identical input always yields identical output.

use crate::config::SarParams;
use crate::types::{Candle, Direction};

/// Indicator state after the last candle of a window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SarState {
    pub direction: Direction,
    /// Trailing stop level
    pub stop: f64,
    /// Acceleration factor, always within `[af_start, af_max]`
    pub af: f64,
    /// Extreme point of the current trend
    pub extreme: f64,
}

/// Parabolic SAR calculator
#[derive(Debug, Clone, Copy)]
pub struct ParabolicSar {
    params: SarParams,
}

impl ParabolicSar {
    pub fn new(params: SarParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SarParams {
        &self.params
    }

    /// Minimum number of candles needed for a reading
    pub fn min_candles(&self) -> usize {
        self.params.min_candles.max(2)
    }

    /// Trend direction at the last candle, `None` on insufficient data
    pub fn reading(&self, candles: &[Candle]) -> Option<Direction> {
        self.calculate(candles).map(|state| state.direction)
    }

    /// Run the stop-and-reverse over `candles` (oldest first)
    pub fn calculate(&self, candles: &[Candle]) -> Option<SarState> {
        if candles.len() < self.min_candles() {
            return None;
        }

        let SarParams {
            af_start,
            af_step,
            af_max,
            ..
        } = self.params;

        let (first, second) = (&candles[0], &candles[1]);
        let mut state = if second.close >= first.close {
            SarState {
                direction: Direction::Long,
                stop: first.low.min(second.low),
                af: af_start,
                extreme: first.high.max(second.high),
            }
        } else {
            SarState {
                direction: Direction::Short,
                stop: first.high.max(second.high),
                af: af_start,
                extreme: first.low.min(second.low),
            }
        };

        for i in 2..candles.len() {
            let bar = &candles[i];
            let prev = &candles[i - 1];
            let prev2 = &candles[i - 2];
            let projected = state.stop + state.af * (state.extreme - state.stop);

            match state.direction {
                Direction::Long => {
                    // Stop may not rise into the prior two bars
                    let projected = projected.min(prev.low).min(prev2.low);
                    if bar.low < projected {
                        state = SarState {
                            direction: Direction::Short,
                            stop: state.extreme,
                            af: af_start,
                            extreme: bar.low,
                        };
                    } else {
                        state.stop = projected;
                        if bar.high > state.extreme {
                            state.extreme = bar.high;
                            state.af = (state.af + af_step).min(af_max);
                        }
                    }
                }
                Direction::Short => {
                    let projected = projected.max(prev.high).max(prev2.high);
                    if bar.high > projected {
                        state = SarState {
                            direction: Direction::Long,
                            stop: state.extreme,
                            af: af_start,
                            extreme: bar.high,
                        };
                    } else {
                        state.stop = projected;
                        if bar.low < state.extreme {
                            state.extreme = bar.low;
                            state.af = (state.af + af_step).min(af_max);
                        }
                    }
                }
            }
        }

        Some(state)
    }
}

impl Default for ParabolicSar {
    fn default() -> Self {
        Self::new(SarParams::default())
    }
}
