//! Trend-pullback entry rule with an optional trade-quality filter.
//!
//! Enter long when the trend is up (close > EMA50, EMA20 > EMA50), RSI has
//! pulled back into a band, volatility and volume are sufficient, and the
//! filter (if any) gives at least `threshold`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::model::{ModelFeatures, TradeQualityModel};
use super::{EntryHint, GateDecision, SignalGate};
use crate::domain::Bar;
use crate::indicators::{FeatureEngine, FeatureRow};

/// Rule thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullbackRules {
    pub rsi_low: f64,
    pub rsi_high: f64,
    /// Minimum ATR / close.
    pub min_atr_pct: f64,
    /// Minimum volume / volume MA.
    pub min_volume_ratio: f64,
}

impl Default for PullbackRules {
    fn default() -> Self {
        Self {
            rsi_low: 40.0,
            rsi_high: 55.0,
            min_atr_pct: 0.003,
            min_volume_ratio: 1.0,
        }
    }
}

impl PullbackRules {
    /// Rule predicate alone. Incomplete rows never match.
    pub fn matches(&self, row: &FeatureRow) -> bool {
        let (Some(rsi), Some(atr), Some(volume_ratio)) = (row.rsi_14, row.atr_14, row.volume_ratio)
        else {
            return false;
        };
        let bullish = row.close > row.ema_50 && row.ema_20 > row.ema_50;
        bullish
            && (self.rsi_low..=self.rsi_high).contains(&rsi)
            && atr / row.close >= self.min_atr_pct
            && volume_ratio >= self.min_volume_ratio
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Verdict {
    Accept { confidence: Option<f64> },
    Reject,
}

pub struct PullbackGate {
    rules: PullbackRules,
    features: FeatureEngine,
    filter: Option<(Arc<dyn TradeQualityModel>, f64)>,
}

impl fmt::Debug for PullbackGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PullbackGate")
            .field("rules", &self.rules)
            .field("filter_threshold", &self.filter.as_ref().map(|(_, t)| *t))
            .finish()
    }
}

impl PullbackGate {
    /// Rule-only gate.
    pub fn new(rules: PullbackRules) -> Self {
        Self {
            rules,
            features: FeatureEngine::new(),
            filter: None,
        }
    }

    /// Attach a probability filter. Signals below `threshold` are dropped.
    pub fn with_filter(mut self, model: Arc<dyn TradeQualityModel>, threshold: f64) -> Self {
        self.filter = Some((model, threshold));
        self
    }

    pub fn latest_features(&self) -> Option<&FeatureRow> {
        self.features.latest()
    }

    /// No filter attached means every rule match passes.
    fn filter_verdict(&self, row: &FeatureRow) -> Verdict {
        let Some((model, threshold)) = &self.filter else {
            return Verdict::Accept { confidence: None };
        };
        let Some(features) = ModelFeatures::from_row(row) else {
            return Verdict::Reject;
        };
        let p = model.probability(&features);
        if p >= *threshold {
            Verdict::Accept {
                confidence: Some(p),
            }
        } else {
            Verdict::Reject
        }
    }
}

impl SignalGate for PullbackGate {
    fn name(&self) -> &str {
        if self.filter.is_some() {
            "pullback+filter"
        } else {
            "pullback"
        }
    }

    fn observe(&mut self, bar: &Bar) {
        self.features.update(bar);
    }

    fn decide(&self, bar: &Bar) -> GateDecision {
        let Some(row) = self.features.latest() else {
            return GateDecision::NoSignal;
        };
        if row.timestamp != bar.timestamp || !self.rules.matches(row) {
            return GateDecision::NoSignal;
        }
        match self.filter_verdict(row) {
            Verdict::Accept { confidence } => GateDecision::EnterLong(EntryHint {
                volatility: row.atr_14,
                confidence,
            }),
            Verdict::Reject => GateDecision::NoSignal,
        }
    }
}
