//! Domain types: bars, the open position, closed trades, equity points.

pub mod bar;
pub mod equity;
pub mod position;
pub mod trade;

pub use bar::{Bar, BarError};
pub use equity::EquityPoint;
pub use position::{Direction, Position};
pub use trade::{ClosedTrade, ExitReason};
