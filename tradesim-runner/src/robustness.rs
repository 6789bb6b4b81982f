//! Robustness sweep — every stop × target ATR-multiplier pair.
//!
//! Each combination is an independent run with its own engine state, so the
//! grid is evaluated in parallel with rayon. Output order is the grid order
//! (stop-loss major).

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use tradesim_core::gate::ScriptedGate;
use tradesim_core::{run_batch, Bar, EngineError, ValidatedConfig};

use crate::config::RobustnessConfig;
use crate::metrics::{equity_values, exit_win_rate, max_drawdown, profit_factor, total_return};
use crate::runner::RunError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustnessRow {
    pub sl_mult: f64,
    pub tp_mult: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
}

/// SL-major list of (sl, tp) pairs.
pub fn grid(config: &RobustnessConfig) -> Vec<(f64, f64)> {
    config
        .sl_multipliers
        .iter()
        .flat_map(|&sl| config.tp_multipliers.iter().map(move |&tp| (sl, tp)))
        .collect()
}

pub fn run_robustness(
    base: &ValidatedConfig,
    decisions: &ScriptedGate,
    bars: &[Bar],
    sweep: &RobustnessConfig,
) -> Result<Vec<RobustnessRow>, RunError> {
    let pairs = grid(sweep);
    let rows = pairs
        .par_iter()
        .map(|&(sl_mult, tp_mult)| -> Result<RobustnessRow, RunError> {
            let config = base
                .with_atr_multipliers(sl_mult, tp_mult)
                .validate()
                .map_err(EngineError::from)?;
            let result = run_batch(config, decisions.clone(), bars)?;
            Ok(RobustnessRow {
                sl_mult,
                tp_mult,
                total_return: total_return(result.initial_equity, result.final_equity),
                max_drawdown: max_drawdown(&equity_values(&result)),
                win_rate: exit_win_rate(result.trades()),
                profit_factor: profit_factor(result.trades()),
                trade_count: result.trades().len(),
            })
        })
        .collect::<Result<Vec<_>, RunError>>()?;

    let positive = rows.iter().filter(|r| r.total_return > 0.0).count();
    info!(combinations = rows.len(), positive, "robustness sweep complete");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_is_sl_major() {
        let pairs = grid(&RobustnessConfig::default());
        assert_eq!(pairs.len(), 9);
        assert_eq!(pairs[0], (1.2, 2.4));
        assert_eq!(pairs[1], (1.2, 3.0));
        assert_eq!(pairs[3], (1.5, 2.4));
        assert_eq!(pairs[8], (1.8, 3.6));
    }
}
