//! Closed trades.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::position::Direction;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::StopLoss => "STOP_LOSS",
            ExitReason::TakeProfit => "TAKE_PROFIT",
            ExitReason::EndOfData => "END_OF_DATA",
        };
        f.write_str(s)
    }
}

/// Immutable record of a round trip. Appended to the ledger, never mutated.
///
/// `equity_after == equity_before - entry_fee - exit_fee + gross_pnl` holds
/// bit-for-bit: the driver books the exit with exactly that expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub direction: Direction,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub exit_reason: ExitReason,
    pub gross_pnl: f64,
    pub entry_fee: f64,
    pub exit_fee: f64,
    pub equity_before: f64,
    pub equity_after: f64,
    pub bars_held: usize,
}

impl ClosedTrade {
    pub fn total_fees(&self) -> f64 {
        self.entry_fee + self.exit_fee
    }

    /// Gross P&L net of both fees.
    pub fn net_pnl(&self) -> f64 {
        self.gross_pnl - self.entry_fee - self.exit_fee
    }

    /// Net P&L as a fraction of entry notional.
    pub fn return_pct(&self) -> f64 {
        let notional = self.size * self.entry_price;
        if notional > 0.0 {
            self.net_pnl() / notional
        } else {
            0.0
        }
    }

    pub fn is_winner(&self) -> bool {
        self.net_pnl() > 0.0
    }

    pub fn duration(&self) -> chrono::Duration {
        self.exit_time - self.entry_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn trade(exit_price: f64) -> ClosedTrade {
        let size = 2.0;
        let entry_price = 100.0;
        let entry_fee = size * entry_price * 0.001;
        let exit_fee = size * exit_price * 0.001;
        let gross_pnl = size * (exit_price - entry_price);
        ClosedTrade {
            direction: Direction::Long,
            entry_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            exit_time: Utc.with_ymd_and_hms(2024, 1, 1, 5, 0, 0).unwrap(),
            entry_price,
            exit_price,
            size,
            stop_loss: 95.0,
            take_profit: 110.0,
            exit_reason: ExitReason::TakeProfit,
            gross_pnl,
            entry_fee,
            exit_fee,
            equity_before: 1000.0,
            equity_after: 1000.0 - entry_fee - exit_fee + gross_pnl,
            bars_held: 5,
        }
    }

    #[test]
    fn net_pnl_subtracts_both_fees() {
        let t = trade(110.0);
        assert!((t.net_pnl() - (20.0 - 0.2 - 0.22)).abs() < 1e-12);
        assert!(t.is_winner());
        assert_eq!(t.duration(), chrono::Duration::hours(5));
    }

    #[test]
    fn scratch_trade_loses_fees() {
        let t = trade(100.0);
        assert!(t.net_pnl() < 0.0);
        assert!(!t.is_winner());
    }

    #[test]
    fn exit_reason_serializes_screaming() {
        let json = serde_json::to_string(&ExitReason::EndOfData).unwrap();
        assert_eq!(json, "\"END_OF_DATA\"");
        assert_eq!(ExitReason::StopLoss.to_string(), "STOP_LOSS");
    }
}
