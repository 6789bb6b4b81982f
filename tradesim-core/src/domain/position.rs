//! The single open position.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trade direction. Long only for now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
}

/// A live position. Stop and target are fixed at entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub direction: Direction,
    pub entry_time: DateTime<Utc>,
    /// Index of the entry bar within the run.
    pub entry_index: usize,
    pub entry_price: f64,
    pub size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub entry_fee: f64,
    /// Equity immediately before the entry fee was charged.
    pub equity_before: f64,
    /// Gate confidence at entry, if the gate reported one.
    pub confidence: Option<f64>,
}

impl Position {
    /// Entry notional (size × entry price).
    pub fn notional(&self) -> f64 {
        self.size * self.entry_price
    }

    /// Risk to the stop, in account currency (fees excluded).
    pub fn risk_amount(&self) -> f64 {
        self.size * (self.entry_price - self.stop_loss)
    }
}
