//! Signal gates — "given this bar and rolling state, enter long or not".
//!
//! The driver calls [`SignalGate::observe`] on every bar (so rolling state
//! advances identically in batch and replay) and [`SignalGate::decide`] only
//! while flat, after exits for the bar are settled. The decision is opaque to
//! the engine: any filter or model has already been applied.

pub mod model;
pub mod pullback;
pub mod scripted;

pub use model::{LogisticModel, ModelError, ModelFeatures, TradeQualityModel};
pub use pullback::{PullbackGate, PullbackRules};
pub use scripted::ScriptedGate;

use crate::domain::Bar;

/// Optional inputs the gate hands to the level rule and the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EntryHint {
    /// Volatility estimate for ATR-based levels.
    pub volatility: Option<f64>,
    /// Filter probability, already thresholded.
    pub confidence: Option<f64>,
}

impl EntryHint {
    pub fn with_volatility(volatility: f64) -> Self {
        Self {
            volatility: Some(volatility),
            confidence: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    NoSignal,
    EnterLong(EntryHint),
}

impl GateDecision {
    pub fn is_entry(&self) -> bool {
        matches!(self, GateDecision::EnterLong(_))
    }
}

pub trait SignalGate {
    fn name(&self) -> &str;

    /// Advance rolling state with a new bar. Called once per bar, in order.
    fn observe(&mut self, bar: &Bar);

    /// Entry decision for the bar last passed to `observe`.
    fn decide(&self, bar: &Bar) -> GateDecision;
}

impl<G: SignalGate + ?Sized> SignalGate for Box<G> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn observe(&mut self, bar: &Bar) {
        (**self).observe(bar)
    }

    fn decide(&self, bar: &Bar) -> GateDecision {
        (**self).decide(bar)
    }
}

/// Gate that never signals.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverGate;

impl SignalGate for NeverGate {
    fn name(&self) -> &str {
        "never"
    }

    fn observe(&mut self, _bar: &Bar) {}

    fn decide(&self, _bar: &Bar) -> GateDecision {
        GateDecision::NoSignal
    }
}
