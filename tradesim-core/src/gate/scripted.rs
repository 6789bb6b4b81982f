//! Precomputed decisions keyed by bar timestamp.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use super::{EntryHint, GateDecision, SignalGate};
use crate::domain::Bar;

/// Replays a fixed decision table. Timestamps without an entry get
/// `NoSignal`. Used for reproducibility checks and precomputed signal files.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGate {
    entries: BTreeMap<DateTime<Utc>, EntryHint>,
}

impl ScriptedGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (DateTime<Utc>, EntryHint)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn enter_at(mut self, timestamp: DateTime<Utc>, hint: EntryHint) -> Self {
        self.entries.insert(timestamp, hint);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SignalGate for ScriptedGate {
    fn name(&self) -> &str {
        "scripted"
    }

    fn observe(&mut self, _bar: &Bar) {}

    fn decide(&self, bar: &Bar) -> GateDecision {
        match self.entries.get(&bar.timestamp) {
            Some(hint) => GateDecision::EnterLong(*hint),
            None => GateDecision::NoSignal,
        }
    }
}
