//! Performance metrics — pure functions over the ledger.
//!
//! Every metric reads the trade list and/or the equity curve and returns a
//! scalar. Nothing here mutates a run.

use serde::{Deserialize, Serialize};
use tradesim_core::{ClosedTrade, ExitReason, RunResult};

/// Hourly bars.
pub const DEFAULT_PERIODS_PER_YEAR: f64 = 24.0 * 365.0;

/// Aggregate performance metrics for a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub initial_equity: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    /// TAKE_PROFIT / (TAKE_PROFIT + STOP_LOSS).
    pub exit_win_rate: f64,
    /// Fraction of trades with positive net P&L.
    pub trade_win_rate: f64,
    pub avg_trade_pnl: f64,
    pub avg_trade_return: f64,
    pub avg_duration_hours: f64,
    pub expectancy: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub total_fees: f64,
    pub sharpe: f64,
    pub trade_count: usize,
    pub take_profit_exits: usize,
    pub stop_loss_exits: usize,
    pub end_of_data_exits: usize,
}

impl PerformanceMetrics {
    pub fn compute(result: &RunResult, periods_per_year: f64) -> Self {
        let trades = result.trades();
        let curve = equity_values(result);
        let (avg_win, avg_loss) = avg_win_loss(trades);
        Self {
            initial_equity: result.initial_equity,
            final_equity: result.final_equity,
            total_return: total_return(result.initial_equity, result.final_equity),
            max_drawdown: max_drawdown(&curve),
            exit_win_rate: exit_win_rate(trades),
            trade_win_rate: trade_win_rate(trades),
            avg_trade_pnl: avg_trade_pnl(trades),
            avg_trade_return: avg_trade_return(trades),
            avg_duration_hours: avg_duration_hours(trades),
            expectancy: expectancy(trades),
            avg_win,
            avg_loss,
            profit_factor: profit_factor(trades),
            total_fees: result.total_fees(),
            sharpe: sharpe_ratio(&curve, periods_per_year),
            trade_count: trades.len(),
            take_profit_exits: count_exits(trades, ExitReason::TakeProfit),
            stop_loss_exits: count_exits(trades, ExitReason::StopLoss),
            end_of_data_exits: count_exits(trades, ExitReason::EndOfData),
        }
    }
}

/// Starting equity followed by every equity point.
pub fn equity_values(result: &RunResult) -> Vec<f64> {
    std::iter::once(result.initial_equity)
        .chain(result.equity_curve().iter().map(|p| p.equity))
        .collect()
}

// ─── Individual metric functions ────────────────────────────────────

pub fn total_return(initial: f64, final_equity: f64) -> f64 {
    if initial <= 0.0 {
        return 0.0;
    }
    (final_equity - initial) / initial
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

pub fn count_exits(trades: &[ClosedTrade], reason: ExitReason) -> usize {
    trades.iter().filter(|t| t.exit_reason == reason).count()
}

/// Take-profit exits over stop-loss plus take-profit exits. END_OF_DATA
/// closes are ignored.
pub fn exit_win_rate(trades: &[ClosedTrade]) -> f64 {
    let tp = count_exits(trades, ExitReason::TakeProfit);
    let sl = count_exits(trades, ExitReason::StopLoss);
    if tp + sl == 0 {
        return 0.0;
    }
    tp as f64 / (tp + sl) as f64
}

pub fn trade_win_rate(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

pub fn avg_trade_pnl(trades: &[ClosedTrade]) -> f64 {
    mean(trades.iter().map(ClosedTrade::net_pnl))
}

/// Mean net return on entry notional.
pub fn avg_trade_return(trades: &[ClosedTrade]) -> f64 {
    mean(trades.iter().map(ClosedTrade::return_pct))
}

pub fn avg_duration_hours(trades: &[ClosedTrade]) -> f64 {
    mean(
        trades
            .iter()
            .map(|t| t.duration().num_seconds() as f64 / 3600.0),
    )
}

/// Mean net P&L of winners and of losers (the latter negative).
pub fn avg_win_loss(trades: &[ClosedTrade]) -> (f64, f64) {
    let wins = mean(trades.iter().map(ClosedTrade::net_pnl).filter(|p| *p > 0.0));
    let losses = mean(trades.iter().map(ClosedTrade::net_pnl).filter(|p| *p < 0.0));
    (wins, losses)
}

/// win_rate × avg_win + (1 − win_rate) × avg_loss.
pub fn expectancy(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let win_rate = trade_win_rate(trades);
    let (avg_win, avg_loss) = avg_win_loss(trades);
    win_rate * avg_win + (1.0 - win_rate) * avg_loss
}

/// Gross profits / gross losses, capped at 100.0 (no losers).
pub fn profit_factor(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trades.iter().map(ClosedTrade::net_pnl).filter(|p| *p > 0.0).sum();
    let gross_loss: f64 = trades
        .iter()
        .map(ClosedTrade::net_pnl)
        .filter(|p| *p < 0.0)
        .map(f64::abs)
        .sum();
    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

/// Annualized Sharpe of per-bar equity returns (zero risk-free rate).
///
/// Returns 0.0 with fewer than two returns or zero variance.
pub fn sharpe_ratio(equity_curve: &[f64], periods_per_year: f64) -> f64 {
    let returns = period_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let m = mean(returns.iter().copied());
    let var = returns.iter().map(|r| (r - m).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
    let std = var.sqrt();
    if std < 1e-15 {
        return 0.0;
    }
    m / std * periods_per_year.sqrt()
}

pub fn period_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use tradesim_core::Direction;

    fn trade(net: f64, reason: ExitReason, hours: i64) -> ClosedTrade {
        let entry_time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        ClosedTrade {
            direction: Direction::Long,
            entry_time,
            exit_time: entry_time + Duration::hours(hours),
            entry_price: 100.0,
            exit_price: 100.0 + net,
            size: 1.0,
            stop_loss: 90.0,
            take_profit: 120.0,
            exit_reason: reason,
            gross_pnl: net,
            entry_fee: 0.0,
            exit_fee: 0.0,
            equity_before: 1000.0,
            equity_after: 1000.0 + net,
            bars_held: hours as usize,
        }
    }

    #[test]
    fn total_return_basic() {
        assert!((total_return(10_000.0, 11_000.0) - 0.1).abs() < 1e-12);
        assert_eq!(total_return(0.0, 5.0), 0.0);
    }

    #[test]
    fn drawdown_is_negative_fraction() {
        let dd = max_drawdown(&[100.0, 120.0, 90.0, 130.0, 117.0]);
        assert!((dd - (-0.25)).abs() < 1e-12);
        assert_eq!(max_drawdown(&[100.0, 110.0, 120.0]), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn exit_win_rate_ignores_end_of_data() {
        let trades = vec![
            trade(10.0, ExitReason::TakeProfit, 2),
            trade(-5.0, ExitReason::StopLoss, 1),
            trade(-5.0, ExitReason::StopLoss, 1),
            trade(3.0, ExitReason::EndOfData, 4),
        ];
        assert!((exit_win_rate(&trades) - 1.0 / 3.0).abs() < 1e-12);
        assert!((trade_win_rate(&trades) - 0.5).abs() < 1e-12);
        assert!((avg_duration_hours(&trades) - 2.0).abs() < 1e-12);
        assert_eq!(exit_win_rate(&[]), 0.0);
    }

    #[test]
    fn expectancy_and_profit_factor() {
        let trades = vec![
            trade(10.0, ExitReason::TakeProfit, 1),
            trade(20.0, ExitReason::TakeProfit, 1),
            trade(-5.0, ExitReason::StopLoss, 1),
            trade(-15.0, ExitReason::StopLoss, 1),
        ];
        let (avg_win, avg_loss) = avg_win_loss(&trades);
        assert_eq!(avg_win, 15.0);
        assert_eq!(avg_loss, -10.0);
        // 0.5 × 15 + 0.5 × −10
        assert!((expectancy(&trades) - 2.5).abs() < 1e-12);
        assert!((profit_factor(&trades) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn profit_factor_capped_without_losers() {
        let trades = vec![trade(10.0, ExitReason::TakeProfit, 1)];
        assert_eq!(profit_factor(&trades), 100.0);
        assert_eq!(profit_factor(&[]), 0.0);
    }

    #[test]
    fn sharpe_zero_for_flat_curve() {
        assert_eq!(sharpe_ratio(&[100.0, 100.0, 100.0], 252.0), 0.0);
        assert!(sharpe_ratio(&[100.0, 101.0, 101.5, 103.0], 252.0) > 0.0);
    }
}
