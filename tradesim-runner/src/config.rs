//! Backtest configuration file (TOML).
//!
//! ```toml
//! [strategy]
//! initial_equity = 10000.0
//! risk_pct = 0.01
//! fee_rate = 0.001
//! atr_sl_mult = 1.5
//! atr_tp_mult = 3.0
//! tie_break = "worst_case"
//!
//! [gate]
//! model_path = "models/trade_quality.json"
//! threshold = 0.6
//!
//! [walk_forward]
//! is_days = 90
//! oos_days = 30
//! ```
//!
//! Every section and field is optional; defaults reproduce the reference
//! strategy.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use tradesim_core::gate::PullbackRules;
use tradesim_core::{ConfigError, EngineConfig, LevelRule, PathPolicy, ValidatedConfig};

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Engine(#[from] ConfigError),
    #[error("[{section}] {message}")]
    Invalid {
        section: &'static str,
        message: String,
    },
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BacktestConfig {
    pub strategy: StrategySection,
    pub gate: GateSection,
    pub walk_forward: WalkForwardConfig,
    pub robustness: RobustnessConfig,
    pub oos: OosConfig,
    pub replay: ReplayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrategySection {
    pub initial_equity: f64,
    pub risk_pct: f64,
    pub fee_rate: f64,
    pub atr_sl_mult: f64,
    pub atr_tp_mult: f64,
    /// When both are set, levels are fixed fractions of entry instead of ATR multiples.
    pub sl_pct: Option<f64>,
    pub tp_pct: Option<f64>,
    pub tie_break: PathPolicy,
    pub min_size_increment: f64,
    pub bar_interval_secs: Option<i64>,
}

impl Default for StrategySection {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            initial_equity: engine.initial_equity,
            risk_pct: engine.risk_pct,
            fee_rate: engine.fee_rate,
            atr_sl_mult: 1.5,
            atr_tp_mult: 3.0,
            sl_pct: None,
            tp_pct: None,
            tie_break: engine.path_policy,
            min_size_increment: engine.min_size_increment,
            bar_interval_secs: None,
        }
    }
}

impl StrategySection {
    pub fn engine_config(&self) -> EngineConfig {
        let levels = match (self.sl_pct, self.tp_pct) {
            (Some(sl_pct), Some(tp_pct)) => LevelRule::FixedFraction { sl_pct, tp_pct },
            _ => LevelRule::AtrMultiple {
                sl_mult: self.atr_sl_mult,
                tp_mult: self.atr_tp_mult,
            },
        };
        EngineConfig {
            initial_equity: self.initial_equity,
            risk_pct: self.risk_pct,
            fee_rate: self.fee_rate,
            levels,
            path_policy: self.tie_break,
            min_size_increment: self.min_size_increment,
            bar_interval_secs: self.bar_interval_secs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateSection {
    #[serde(flatten)]
    pub rules: PullbackRules,
    /// Logistic model weights (JSON). Absent means rule-only.
    pub model_path: Option<PathBuf>,
    pub threshold: f64,
}

impl Default for GateSection {
    fn default() -> Self {
        Self {
            rules: PullbackRules::default(),
            model_path: None,
            threshold: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WalkForwardConfig {
    pub is_days: i64,
    pub oos_days: i64,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            is_days: 90,
            oos_days: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RobustnessConfig {
    pub sl_multipliers: Vec<f64>,
    pub tp_multipliers: Vec<f64>,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            sl_multipliers: vec![1.2, 1.5, 1.8],
            tp_multipliers: vec![2.4, 3.0, 3.6],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OosConfig {
    /// Fraction of bars treated as training history; the rest is tested.
    pub train_pct: f64,
}

impl Default for OosConfig {
    fn default() -> Self {
        Self { train_pct: 0.7 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplayConfig {
    /// Pause between bars, for watching a replay unfold.
    pub delay_ms: u64,
    /// Log a progress line every this many bars.
    pub progress_every: usize,
    /// Most recent bars kept in the replay window.
    pub lookback: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            delay_ms: 0,
            progress_every: 500,
            lookback: 200,
        }
    }
}

impl BacktestConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigFileError> {
        let config: Self = toml::from_str(text)?;
        config.check_sections()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Validated engine config for the `[strategy]` section.
    pub fn engine(&self) -> Result<ValidatedConfig, ConfigFileError> {
        Ok(self.strategy.engine_config().validate()?)
    }

    fn check_sections(&self) -> Result<(), ConfigFileError> {
        self.engine()?;
        let invalid = |section, message: String| Err(ConfigFileError::Invalid { section, message });
        if !(0.0..=1.0).contains(&self.gate.threshold) {
            return invalid("gate", format!("threshold {} outside [0, 1]", self.gate.threshold));
        }
        if self.walk_forward.is_days <= 0 || self.walk_forward.oos_days <= 0 {
            return invalid(
                "walk_forward",
                format!(
                    "window lengths must be positive (is_days {}, oos_days {})",
                    self.walk_forward.is_days, self.walk_forward.oos_days
                ),
            );
        }
        let grid = &self.robustness;
        if grid.sl_multipliers.is_empty() || grid.tp_multipliers.is_empty() {
            return invalid("robustness", "multiplier lists must not be empty".into());
        }
        if grid
            .sl_multipliers
            .iter()
            .chain(&grid.tp_multipliers)
            .any(|m| !(m.is_finite() && *m > 0.0))
        {
            return invalid("robustness", "multipliers must be positive".into());
        }
        if !(self.oos.train_pct > 0.0 && self.oos.train_pct < 1.0) {
            return invalid("oos", format!("train_pct {} outside (0, 1)", self.oos.train_pct));
        }
        if self.replay.progress_every == 0 {
            return invalid("replay", "progress_every must be at least 1".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_reference_defaults() {
        let config = BacktestConfig::from_toml_str("").unwrap();
        let engine = config.engine().unwrap();
        assert_eq!(engine.initial_equity, 10_000.0);
        assert_eq!(engine.fee_rate, 0.001);
        assert_eq!(
            engine.levels,
            LevelRule::AtrMultiple {
                sl_mult: 1.5,
                tp_mult: 3.0
            }
        );
        assert_eq!(config.gate.threshold, 0.6);
        assert_eq!(config.oos.train_pct, 0.7);
        assert_eq!(config.robustness.sl_multipliers, vec![1.2, 1.5, 1.8]);
    }

    #[test]
    fn parses_sections() {
        let text = r#"
            [strategy]
            risk_pct = 0.02
            tie_break = "deterministic"
            sl_pct = 0.01
            tp_pct = 0.03

            [gate]
            rsi_low = 35.0
            threshold = 0.55

            [walk_forward]
            is_days = 60
            oos_days = 15
        "#;
        let config = BacktestConfig::from_toml_str(text).unwrap();
        let engine = config.engine().unwrap();
        assert_eq!(engine.risk_pct, 0.02);
        assert_eq!(engine.path_policy, PathPolicy::Deterministic);
        assert_eq!(
            engine.levels,
            LevelRule::FixedFraction {
                sl_pct: 0.01,
                tp_pct: 0.03
            }
        );
        assert_eq!(config.gate.rules.rsi_low, 35.0);
        assert_eq!(config.gate.rules.rsi_high, 55.0);
        assert_eq!(config.walk_forward.oos_days, 15);
    }

    #[test]
    fn invalid_engine_values_fail_fast() {
        let err = BacktestConfig::from_toml_str("[strategy]\nrisk_pct = 1.5\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigFileError::Engine(ConfigError::RiskFraction(_))
        ));
    }

    #[test]
    fn invalid_sections_fail_fast() {
        let err = BacktestConfig::from_toml_str("[oos]\ntrain_pct = 1.0\n").unwrap_err();
        assert!(matches!(err, ConfigFileError::Invalid { section: "oos", .. }));
        let err = BacktestConfig::from_toml_str("[robustness]\nsl_multipliers = []\n").unwrap_err();
        assert!(matches!(err, ConfigFileError::Invalid { section: "robustness", .. }));
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(matches!(
            BacktestConfig::from_toml_str("[strategy]\nrisk = 0.01\n"),
            Err(ConfigFileError::Parse(_))
        ));
    }

    #[test]
    fn shipped_sample_config_parses() {
        let text = include_str!("../../configs/backtest.toml");
        let config = BacktestConfig::from_toml_str(text).unwrap();
        assert_eq!(config.strategy.bar_interval_secs, Some(3600));
        assert_eq!(config.replay.lookback, 200);
        assert!(config.gate.model_path.is_none());
    }
}
