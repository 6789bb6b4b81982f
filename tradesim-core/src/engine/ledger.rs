//! Append-only trade and equity ledger.
//!
//! Only the driver holds `&mut Ledger`; everything else sees slices. Entries
//! are pushed, never edited or removed, so a mid-run read is always a prefix
//! of the final ledger.

use serde::{Deserialize, Serialize};

use crate::domain::{ClosedTrade, EquityPoint};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    trades: Vec<ClosedTrade>,
    equity: Vec<EquityPoint>,
}

impl Ledger {
    pub fn with_capacity(bars: usize) -> Self {
        Self {
            trades: Vec::new(),
            equity: Vec::with_capacity(bars),
        }
    }

    pub(crate) fn record_trade(&mut self, trade: ClosedTrade) {
        self.trades.push(trade);
    }

    pub(crate) fn record_equity(&mut self, point: EquityPoint) {
        self.equity.push(point);
    }

    pub fn trades(&self) -> &[ClosedTrade] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity
    }

    pub fn last_equity(&self) -> Option<f64> {
        self.equity.last().map(|p| p.equity)
    }

    /// Final equity implied by the trade list alone.
    ///
    /// Equals the driver's running equity whenever no position is open.
    pub fn replayed_equity(&self, initial_equity: f64) -> f64 {
        self.trades
            .iter()
            .fold(initial_equity, |eq, t| eq - t.entry_fee - t.exit_fee + t.gross_pnl)
    }
}
