//! Risk & sizing — fixed-fractional position sizing and proportional fees.
//!
//! All functions are pure. Size is computed once at entry from the equity
//! at that instant and never revised afterwards.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{EngineConfig, LevelRule};

/// Guards the floor against representation error (e.g. 2.0 / 0.001).
const FLOOR_EPSILON: f64 = 1e-9;

/// Why an entry signal did not become a position. Recoverable: the run
/// continues and the rejection is recorded.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryRejection {
    #[error("stop distance is zero")]
    ZeroStopDistance,
    #[error("computed size {size} is not positive")]
    NonPositiveSize { size: f64 },
    #[error("computed size {size} is below the minimum increment {increment}")]
    BelowMinimumSize { size: f64, increment: f64 },
    #[error("no usable volatility in the entry hint")]
    MissingVolatility,
    #[error("stop {stop_loss} / target {take_profit} invalid for entry {entry}")]
    InvalidLevels {
        entry: f64,
        stop_loss: f64,
        take_profit: f64,
    },
    #[error("a position is already open")]
    PositionOpen,
}

/// Stop and target prices fixed at entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Levels {
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// Derive stop/target from the entry price and the configured rule.
pub fn compute_levels(
    rule: &LevelRule,
    entry: f64,
    volatility: Option<f64>,
) -> Result<Levels, EntryRejection> {
    let (sl_dist, tp_dist) = match *rule {
        LevelRule::AtrMultiple { sl_mult, tp_mult } => {
            let vol = volatility
                .filter(|v| v.is_finite() && *v > 0.0)
                .ok_or(EntryRejection::MissingVolatility)?;
            (sl_mult * vol, tp_mult * vol)
        }
        LevelRule::FixedFraction { sl_pct, tp_pct } => (entry * sl_pct, entry * tp_pct),
    };
    let levels = Levels {
        stop_loss: entry - sl_dist,
        take_profit: entry + tp_dist,
    };
    if !(levels.stop_loss > 0.0 && levels.stop_loss < entry && levels.take_profit > entry) {
        return Err(EntryRejection::InvalidLevels {
            entry,
            stop_loss: levels.stop_loss,
            take_profit: levels.take_profit,
        });
    }
    Ok(levels)
}

/// Sizing parameters lifted out of the engine config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskPolicy {
    pub risk_pct: f64,
    pub fee_rate: f64,
    pub min_size_increment: f64,
}

impl RiskPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            risk_pct: config.risk_pct,
            fee_rate: config.fee_rate,
            min_size_increment: config.min_size_increment,
        }
    }

    /// size = equity × r / |entry − stop|, floored to the size increment.
    pub fn position_size(&self, equity: f64, entry: f64, stop: f64) -> Result<f64, EntryRejection> {
        let per_unit = (entry - stop).abs();
        if per_unit == 0.0 || !per_unit.is_finite() {
            return Err(EntryRejection::ZeroStopDistance);
        }
        let raw = equity * self.risk_pct / per_unit;
        if !(raw.is_finite() && raw > 0.0) {
            return Err(EntryRejection::NonPositiveSize { size: raw });
        }
        if self.min_size_increment == 0.0 {
            return Ok(raw);
        }
        let steps = (raw / self.min_size_increment + FLOOR_EPSILON).floor();
        let size = steps * self.min_size_increment;
        if size <= 0.0 {
            return Err(EntryRejection::BelowMinimumSize {
                size: raw,
                increment: self.min_size_increment,
            });
        }
        Ok(size)
    }

    /// Fee on a fill: size × price × f.
    pub fn fee(&self, size: f64, price: f64) -> f64 {
        size * price * self.fee_rate
    }
}

/// Realized P&L of a long round trip, before fees.
pub fn realized_pnl(size: f64, entry: f64, exit: f64) -> f64 {
    size * (exit - entry)
}
