//! Position state machine — FLAT / OPEN with fixed stop and target.
//!
//! Exit evaluation reads only the current bar and the open position. When a
//! bar's range spans both levels, the configured [`PathPolicy`] decides which
//! one filled first; evaluation order of the checks never does.

use crate::config::PathPolicy;
use crate::domain::{Bar, ExitReason, Position};
use crate::sizing::EntryRejection;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PositionState {
    #[default]
    Flat,
    Open(Position),
}

/// An exit triggered by a bar: reason and fill price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitSignal {
    pub reason: ExitReason,
    pub price: f64,
}

/// Decide whether `bar` exits `position`.
///
/// Stop fills at the stop level, target at the target level, even when the
/// bar gaps through either.
pub fn evaluate_exit(position: &Position, bar: &Bar, policy: PathPolicy) -> Option<ExitSignal> {
    let stop_hit = bar.low <= position.stop_loss;
    let target_hit = bar.high >= position.take_profit;

    let stop = ExitSignal {
        reason: ExitReason::StopLoss,
        price: position.stop_loss,
    };
    let target = ExitSignal {
        reason: ExitReason::TakeProfit,
        price: position.take_profit,
    };

    match (stop_hit, target_hit) {
        (false, false) => None,
        (true, false) => Some(stop),
        (false, true) => Some(target),
        (true, true) => Some(match policy {
            PathPolicy::WorstCase => stop,
            PathPolicy::BestCase => target,
            PathPolicy::Deterministic => {
                let high_first = (bar.open - bar.high).abs() <= (bar.open - bar.low).abs();
                if high_first {
                    target
                } else {
                    stop
                }
            }
        }),
    }
}

/// Owns the single position slot.
#[derive(Debug, Clone, Default)]
pub struct PositionMachine {
    state: PositionState,
    policy: PathPolicy,
}

impl PositionMachine {
    pub fn new(policy: PathPolicy) -> Self {
        Self {
            state: PositionState::Flat,
            policy,
        }
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, PositionState::Open(_))
    }

    pub fn position(&self) -> Option<&Position> {
        match &self.state {
            PositionState::Open(p) => Some(p),
            PositionState::Flat => None,
        }
    }

    /// FLAT → OPEN. Refused while a position is open (no pyramiding).
    pub fn open(&mut self, position: Position) -> Result<(), EntryRejection> {
        if self.is_open() {
            return Err(EntryRejection::PositionOpen);
        }
        self.state = PositionState::Open(position);
        Ok(())
    }

    /// OPEN → FLAT if `bar` crosses a level. Returns the closed position and
    /// the fill; leaves the state untouched otherwise.
    pub fn check_exit(&mut self, bar: &Bar) -> Option<(Position, ExitSignal)> {
        let signal = evaluate_exit(self.position()?, bar, self.policy)?;
        match std::mem::take(&mut self.state) {
            PositionState::Open(position) => Some((position, signal)),
            PositionState::Flat => None,
        }
    }

    /// OPEN → FLAT unconditionally (end of data or cancellation).
    pub fn liquidate(&mut self) -> Option<Position> {
        match std::mem::take(&mut self.state) {
            PositionState::Open(position) => Some(position),
            PositionState::Flat => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Direction;
    use chrono::{TimeZone, Utc};

    fn position() -> Position {
        Position {
            direction: Direction::Long,
            entry_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            entry_index: 0,
            entry_price: 100.0,
            size: 1.0,
            stop_loss: 95.0,
            take_profit: 110.0,
            entry_fee: 0.1,
            equity_before: 1000.0,
            confidence: None,
        }
    }

    fn bar(open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap(),
            open,
            high,
            low,
            close,
            1.0,
        )
    }

    #[test]
    fn inside_range_holds() {
        assert_eq!(
            evaluate_exit(&position(), &bar(100.0, 105.0, 97.0, 101.0), PathPolicy::WorstCase),
            None
        );
    }

    #[test]
    fn stop_fills_at_stop_level_even_on_gap() {
        let exit = evaluate_exit(&position(), &bar(90.0, 92.0, 88.0, 91.0), PathPolicy::WorstCase)
            .unwrap();
        assert_eq!(exit.reason, ExitReason::StopLoss);
        assert_eq!(exit.price, 95.0);
    }

    #[test]
    fn touching_target_exactly_exits() {
        let exit = evaluate_exit(&position(), &bar(105.0, 110.0, 104.0, 108.0), PathPolicy::WorstCase)
            .unwrap();
        assert_eq!(exit.reason, ExitReason::TakeProfit);
        assert_eq!(exit.price, 110.0);
    }

    #[test]
    fn both_crossed_follows_policy() {
        let wide = bar(100.0, 112.0, 94.0, 101.0);
        let p = position();
        assert_eq!(
            evaluate_exit(&p, &wide, PathPolicy::WorstCase).unwrap().reason,
            ExitReason::StopLoss
        );
        assert_eq!(
            evaluate_exit(&p, &wide, PathPolicy::BestCase).unwrap().reason,
            ExitReason::TakeProfit
        );
    }

    #[test]
    fn deterministic_infers_path_from_open() {
        let p = position();
        // open near the high: high visited first
        let up_first = bar(110.0, 112.0, 94.0, 100.0);
        assert_eq!(
            evaluate_exit(&p, &up_first, PathPolicy::Deterministic)
                .unwrap()
                .reason,
            ExitReason::TakeProfit
        );
        // open near the low: low visited first
        let down_first = bar(96.0, 112.0, 94.0, 100.0);
        assert_eq!(
            evaluate_exit(&p, &down_first, PathPolicy::Deterministic)
                .unwrap()
                .reason,
            ExitReason::StopLoss
        );
    }

    #[test]
    fn machine_refuses_second_position() {
        let mut machine = PositionMachine::new(PathPolicy::WorstCase);
        assert!(!machine.is_open());
        machine.open(position()).unwrap();
        assert_eq!(machine.open(position()), Err(EntryRejection::PositionOpen));
        assert!(machine.is_open());
    }

    #[test]
    fn check_exit_transitions_to_flat() {
        let mut machine = PositionMachine::new(PathPolicy::WorstCase);
        machine.open(position()).unwrap();
        assert!(machine.check_exit(&bar(100.0, 105.0, 97.0, 101.0)).is_none());
        assert!(machine.is_open());
        let (closed, signal) = machine.check_exit(&bar(100.0, 100.0, 94.0, 95.0)).unwrap();
        assert_eq!(closed.entry_price, 100.0);
        assert_eq!(signal.reason, ExitReason::StopLoss);
        assert_eq!(machine.state(), &PositionState::Flat);
    }

    #[test]
    fn liquidate_when_flat_is_noop() {
        let mut machine = PositionMachine::default();
        assert!(machine.liquidate().is_none());
    }
}
