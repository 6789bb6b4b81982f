//! Walk-forward validation — consecutive calendar windows.
//!
//! Window k: IS = [start_k, start_k + is_days), OOS = [IS end, IS end + oos_days),
//! with start_{k+1} = start_k + oos_days. Generation stops once an OOS end
//! would pass the last bar. IS and OOS are run separately, each with a
//! fresh gate and fresh engine state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use tradesim_core::gate::ScriptedGate;
use tradesim_core::{run_batch, Bar, EngineError, ValidatedConfig};

use crate::config::WalkForwardConfig;
use crate::data_loader::slice_by_time;
use crate::metrics::{equity_values, exit_win_rate, max_drawdown, total_return};

/// Errors from walk-forward validation.
#[derive(Debug, Error)]
pub enum WalkForwardError {
    #[error("insufficient data: {span_days} days of bars < one window of {needed_days} days")]
    InsufficientData { span_days: i64, needed_days: i64 },
    #[error("backtest error on window {window} ({phase}): {source}")]
    BacktestFailed {
        window: usize,
        phase: &'static str,
        #[source]
        source: EngineError,
    },
}

/// Time bounds of one window (all half-open).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    /// 1-based.
    pub window: usize,
    pub is_start: DateTime<Utc>,
    pub is_end: DateTime<Utc>,
    pub oos_end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowResult {
    pub bounds: WindowBounds,
    pub is_bars: usize,
    pub oos_bars: usize,
    pub is_trades: usize,
    pub oos_trades: usize,
    pub is_total_return: f64,
    pub is_max_drawdown: f64,
    pub oos_total_return: f64,
    pub oos_max_drawdown: f64,
    pub oos_win_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardReport {
    pub windows: Vec<WindowResult>,
    pub mean_oos_return: f64,
    /// Fraction of windows with a positive OOS return.
    pub oos_positive_fraction: f64,
}

/// Generate window bounds over `[first, last]`.
pub fn generate_windows(
    first: DateTime<Utc>,
    last: DateTime<Utc>,
    config: &WalkForwardConfig,
) -> Vec<WindowBounds> {
    let is_len = Duration::days(config.is_days);
    let oos_len = Duration::days(config.oos_days);
    let mut windows = Vec::new();
    let mut start = first;
    loop {
        let is_end = start + is_len;
        let oos_end = is_end + oos_len;
        if oos_end > last {
            break;
        }
        windows.push(WindowBounds {
            window: windows.len() + 1,
            is_start: start,
            is_end,
            oos_end,
        });
        start += oos_len;
    }
    windows
}

/// Run every window. `decisions` are the gate's entry decisions over the
/// full history; each run gets its own copy.
pub fn run_walk_forward(
    config: &ValidatedConfig,
    decisions: &ScriptedGate,
    bars: &[Bar],
    wf: &WalkForwardConfig,
) -> Result<WalkForwardReport, WalkForwardError> {
    let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
        return Err(WalkForwardError::InsufficientData {
            span_days: 0,
            needed_days: wf.is_days + wf.oos_days,
        });
    };
    let all_bounds = generate_windows(first.timestamp, last.timestamp, wf);
    if all_bounds.is_empty() {
        return Err(WalkForwardError::InsufficientData {
            span_days: (last.timestamp - first.timestamp).num_days(),
            needed_days: wf.is_days + wf.oos_days,
        });
    }

    let mut windows = Vec::with_capacity(all_bounds.len());
    for bounds in all_bounds {
        let is_bars = slice_by_time(bars, bounds.is_start, bounds.is_end);
        let oos_bars = slice_by_time(bars, bounds.is_end, bounds.oos_end);

        let run = |phase: &'static str, slice: &[Bar]| {
            run_batch(config.clone(), decisions.clone(), slice).map_err(|source| {
                WalkForwardError::BacktestFailed {
                    window: bounds.window,
                    phase,
                    source,
                }
            })
        };
        let is_run = run("in-sample", is_bars)?;
        let oos_run = run("out-of-sample", oos_bars)?;

        let result = WindowResult {
            bounds,
            is_bars: is_bars.len(),
            oos_bars: oos_bars.len(),
            is_trades: is_run.trades().len(),
            oos_trades: oos_run.trades().len(),
            is_total_return: total_return(is_run.initial_equity, is_run.final_equity),
            is_max_drawdown: max_drawdown(&equity_values(&is_run)),
            oos_total_return: total_return(oos_run.initial_equity, oos_run.final_equity),
            oos_max_drawdown: max_drawdown(&equity_values(&oos_run)),
            oos_win_rate: exit_win_rate(oos_run.trades()),
        };
        debug!(
            window = bounds.window,
            is_return = result.is_total_return,
            oos_return = result.oos_total_return,
            "walk-forward window"
        );
        windows.push(result);
    }

    let n = windows.len() as f64;
    let mean_oos_return = windows.iter().map(|w| w.oos_total_return).sum::<f64>() / n;
    let oos_positive_fraction =
        windows.iter().filter(|w| w.oos_total_return > 0.0).count() as f64 / n;
    info!(
        windows = windows.len(),
        mean_oos_return, oos_positive_fraction, "walk-forward complete"
    );
    Ok(WalkForwardReport {
        windows,
        mean_oos_return,
        oos_positive_fraction,
    })
}
