//! # Stage Datasets
//!
//! Per-stage record lists owned by one session view, guarded by fetch
//! generations.
//!
//! Every fetch of a stage takes a fresh [`Generation`] before it starts.
//! When the fetch completes, its records are stored only if no newer fetch
//! of the same stage has started in the meantime. A slow response can
//! therefore never overwrite a fresher one.

use crate::StageRecord;
use std::collections::BTreeMap;

/// Fetch sequence number, per stage, strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

#[derive(Debug, Default)]
struct Slot {
    started: Generation,
    stored: Option<Generation>,
    records: Vec<StageRecord>,
}

/// Record lists keyed by stage name.
#[derive(Debug, Default)]
pub struct StageDatasets {
    slots: BTreeMap<String, Slot>,
}

impl StageDatasets {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fetch of `stage` and return its generation.
    pub fn begin_fetch(&mut self, stage: &str) -> Generation {
        let slot = self.slots.entry(stage.to_string()).or_default();
        slot.started = Generation(slot.started.0.saturating_add(1));
        slot.started
    }

    /// Store the result of a fetch.
    ///
    /// Returns `false` (and discards `records`) when a newer fetch of the
    /// same stage has started since `generation` was issued.
    pub fn store(
        &mut self,
        stage: &str,
        generation: Generation,
        records: Vec<StageRecord>,
    ) -> bool {
        let slot = self.slots.entry(stage.to_string()).or_default();
        if generation < slot.started {
            return false;
        }
        slot.stored = Some(generation);
        slot.records = records;
        true
    }

    /// Records of the last accepted fetch (empty if none).
    #[must_use]
    pub fn records(&self, stage: &str) -> &[StageRecord] {
        self.slots
            .get(stage)
            .map(|slot| slot.records.as_slice())
            .unwrap_or(&[])
    }

    /// Whether any fetch of `stage` has been accepted.
    #[must_use]
    pub fn is_loaded(&self, stage: &str) -> bool {
        self.slots
            .get(stage)
            .is_some_and(|slot| slot.stored.is_some())
    }

    /// Generation of the last accepted fetch.
    #[must_use]
    pub fn stored_generation(&self, stage: &str) -> Option<Generation> {
        self.slots.get(stage).and_then(|slot| slot.stored)
    }
}

// =============================================================================
// TESTS
// =============================================================================
