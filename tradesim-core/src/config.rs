//! Engine configuration — built once, validated once, then read-only.
//!
//! The driver only accepts a [`ValidatedConfig`], so a run can never start
//! from parameters that failed validation.

use serde::{Deserialize, Serialize};
use std::ops::Deref;
use thiserror::Error;

/// How stop-loss and take-profit distances are derived at entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LevelRule {
    /// stop = entry − sl_mult × volatility, target = entry + tp_mult × volatility.
    /// Volatility comes from the gate's entry hint (ATR).
    AtrMultiple { sl_mult: f64, tp_mult: f64 },
    /// stop = entry × (1 − sl_pct), target = entry × (1 + tp_pct).
    FixedFraction { sl_pct: f64, tp_pct: f64 },
}

impl Default for LevelRule {
    fn default() -> Self {
        LevelRule::AtrMultiple {
            sl_mult: 1.5,
            tp_mult: 3.0,
        }
    }
}

/// Tie-break when a single bar crosses both the stop and the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathPolicy {
    /// Stop-loss wins.
    #[default]
    WorstCase,
    /// Take-profit wins.
    BestCase,
    /// Infer the intrabar path from OHLC: open nearer the high means the
    /// high was visited first.
    Deterministic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub initial_equity: f64,
    /// Fraction of equity risked per trade, in (0, 1).
    pub risk_pct: f64,
    /// Proportional fee on notional, charged on entry and on exit.
    pub fee_rate: f64,
    pub levels: LevelRule,
    pub path_policy: PathPolicy,
    /// Sizes are floored to a multiple of this. Zero disables flooring.
    pub min_size_increment: f64,
    /// Expected bar spacing. When set, timestamps must sit on this grid.
    #[serde(default)]
    pub bar_interval_secs: Option<i64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_equity: 10_000.0,
            risk_pct: 0.01,
            fee_rate: 0.001,
            levels: LevelRule::default(),
            path_policy: PathPolicy::default(),
            min_size_increment: 0.001,
            bar_interval_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("initial equity must be positive and finite, got {0}")]
    InitialEquity(f64),
    #[error("risk fraction must be in (0, 1), got {0}")]
    RiskFraction(f64),
    #[error("fee rate must be in [0, 1), got {0}")]
    FeeRate(f64),
    #[error("stop-loss parameter must be positive{bound}, got {value}")]
    StopLoss { value: f64, bound: &'static str },
    #[error("take-profit parameter must be positive, got {0}")]
    TakeProfit(f64),
    #[error("minimum size increment must be non-negative and finite, got {0}")]
    SizeIncrement(f64),
    #[error("bar interval must be positive, got {0}s")]
    BarInterval(i64),
}

impl EngineConfig {
    /// Return a copy with different ATR multipliers (robustness sweeps).
    pub fn with_atr_multipliers(&self, sl_mult: f64, tp_mult: f64) -> Self {
        Self {
            levels: LevelRule::AtrMultiple { sl_mult, tp_mult },
            ..self.clone()
        }
    }

    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        if !(self.initial_equity.is_finite() && self.initial_equity > 0.0) {
            return Err(ConfigError::InitialEquity(self.initial_equity));
        }
        if !(self.risk_pct > 0.0 && self.risk_pct < 1.0) {
            return Err(ConfigError::RiskFraction(self.risk_pct));
        }
        if !(self.fee_rate >= 0.0 && self.fee_rate < 1.0) {
            return Err(ConfigError::FeeRate(self.fee_rate));
        }
        match self.levels {
            LevelRule::AtrMultiple { sl_mult, tp_mult } => {
                if !(sl_mult.is_finite() && sl_mult > 0.0) {
                    return Err(ConfigError::StopLoss {
                        value: sl_mult,
                        bound: "",
                    });
                }
                if !(tp_mult.is_finite() && tp_mult > 0.0) {
                    return Err(ConfigError::TakeProfit(tp_mult));
                }
            }
            LevelRule::FixedFraction { sl_pct, tp_pct } => {
                if !(sl_pct > 0.0 && sl_pct < 1.0) {
                    return Err(ConfigError::StopLoss {
                        value: sl_pct,
                        bound: " and below 1",
                    });
                }
                if !(tp_pct.is_finite() && tp_pct > 0.0) {
                    return Err(ConfigError::TakeProfit(tp_pct));
                }
            }
        }
        if !(self.min_size_increment.is_finite() && self.min_size_increment >= 0.0) {
            return Err(ConfigError::SizeIncrement(self.min_size_increment));
        }
        if let Some(secs) = self.bar_interval_secs {
            if secs <= 0 {
                return Err(ConfigError::BarInterval(secs));
            }
        }
        Ok(ValidatedConfig(self))
    }
}

/// An [`EngineConfig`] that passed [`EngineConfig::validate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidatedConfig(EngineConfig);

impl ValidatedConfig {
    pub fn into_inner(self) -> EngineConfig {
        self.0
    }
}

impl Deref for ValidatedConfig {
    type Target = EngineConfig;

    fn deref(&self) -> &EngineConfig {
        &self.0
    }
}
