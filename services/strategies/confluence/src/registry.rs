//! Instrument registry
//!
//! The catalog is fixed at construction. Each entry owns exactly one live
//! record that is mutated in place for the lifetime of the engine; records are
//! never removed or re-added, so indices into the live vector are stable and
//! iteration order is always catalog order.

use crate::config::ReadinessConfig;
use crate::types::{InstrumentSpec, InstrumentState};
use parking_lot::RwLock;
use std::collections::HashMap;

pub struct InstrumentRegistry {
    catalog: Vec<InstrumentSpec>,
    index: HashMap<String, usize>,
    readiness: ReadinessConfig,
    live: RwLock<Vec<InstrumentState>>,
}

impl InstrumentRegistry {
    pub fn new(catalog: Vec<InstrumentSpec>, readiness: ReadinessConfig) -> Self {
        let index = catalog
            .iter()
            .enumerate()
            .map(|(i, spec)| (spec.id.clone(), i))
            .collect();
        let live = catalog
            .iter()
            .map(|spec| InstrumentState::from_spec(spec, &readiness))
            .collect();

        Self {
            catalog,
            index,
            readiness,
            live: RwLock::new(live),
        }
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    pub fn catalog(&self) -> &[InstrumentSpec] {
        &self.catalog
    }

    /// Instrument identifiers in catalog order
    pub fn ids(&self) -> Vec<String> {
        self.catalog.iter().map(|spec| spec.id.clone()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Copy of one live record
    pub fn get(&self, id: &str) -> Option<InstrumentState> {
        let i = *self.index.get(id)?;
        Some(self.live.read()[i].clone())
    }

    /// Mutate one live record in place; `None` for an unknown id
    pub fn update<R>(&self, id: &str, f: impl FnOnce(&mut InstrumentState) -> R) -> Option<R> {
        let i = *self.index.get(id)?;
        let mut live = self.live.write();
        Some(f(&mut live[i]))
    }

    /// Read every live record under a single read lock
    pub fn with_all<R>(&self, f: impl FnOnce(&[InstrumentState]) -> R) -> R {
        let live = self.live.read();
        f(&live)
    }

    /// Mutate every live record under a single write lock
    pub fn with_all_mut<R>(&self, f: impl FnOnce(&mut [InstrumentState]) -> R) -> R {
        let mut live = self.live.write();
        f(&mut live)
    }

    /// Copy of every live record, catalog order
    pub fn snapshot(&self) -> Vec<InstrumentState> {
        self.live.read().clone()
    }

    /// Restore every live record to its catalog defaults
    pub fn reset(&self) {
        let mut live = self.live.write();
        for (state, spec) in live.iter_mut().zip(&self.catalog) {
            *state = InstrumentState::from_spec(spec, &self.readiness);
        }
    }
}
