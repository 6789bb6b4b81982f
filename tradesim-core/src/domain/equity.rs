use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Realized account equity after a bar was processed.
///
/// While a position is open the entry fee is already deducted; unrealized
/// P&L is not included.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
    pub position_open: bool,
}
