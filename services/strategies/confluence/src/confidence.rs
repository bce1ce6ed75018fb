//! Confidence sources
//!
//! The engine asks a [`ConfidenceSource`] for a new raw score on every drift
//! tick. The readiness tracker clamps the score and applies hysteresis, so a
//! source is free to return anything.

use crate::types::InstrumentState;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait ConfidenceSource: Send {
    /// Raw next score for `instrument`
    fn next(&mut self, instrument: &InstrumentState) -> f64;
}

/// Uniform random walk around the current score
#[derive(Debug)]
pub struct RandomWalk {
    step: f64,
    rng: StdRng,
}

impl RandomWalk {
    /// Each step moves the score by a uniform amount in `[-step, +step]`
    pub fn new(step: f64) -> Self {
        Self {
            step: step.abs(),
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(step: f64, seed: u64) -> Self {
        Self {
            step: step.abs(),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl ConfidenceSource for RandomWalk {
    fn next(&mut self, instrument: &InstrumentState) -> f64 {
        if self.step == 0.0 {
            return instrument.confidence;
        }
        instrument.confidence + self.rng.gen_range(-self.step..=self.step)
    }
}

/// Keeps every score where it is; scores are then driven externally
#[derive(Debug, Default, Clone, Copy)]
pub struct Fixed;

impl ConfidenceSource for Fixed {
    fn next(&mut self, instrument: &InstrumentState) -> f64 {
        instrument.confidence
    }
}
