//! Simulation driver — the only run loop.
//!
//! Per bar, in order:
//! 1. integrity and ordering checks (fatal on failure, before any mutation)
//! 2. gate observes the bar
//! 3. if OPEN: exit check (stop / target / tie-break)
//! 4. if FLAT: gate decision, sizing, entry at the bar's close
//! 5. one equity point
//!
//! Batch runs and live replay both go through [`Simulation::step`], so the
//! same bars and gate decisions always produce the same ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, ValidatedConfig};
use crate::domain::{Bar, ClosedTrade, Direction, EquityPoint, ExitReason, Position};
use crate::gate::{EntryHint, GateDecision, SignalGate};
use crate::sizing::{compute_levels, realized_pnl, EntryRejection, RiskPolicy};

use super::error::EngineError;
use super::ledger::Ledger;
use super::position_machine::PositionMachine;
use super::source::{BarSource, SliceSource};

/// An entry signal that did not open a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedEntry {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub reason: EntryRejection,
}

/// What happened on one bar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarOutcome {
    pub index: usize,
    pub exit: Option<ClosedTrade>,
    pub entry: Option<Position>,
    pub rejection: Option<EntryRejection>,
    pub equity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Source exhausted.
    EndOfData,
    /// Cancelled between bars; finalized as end of data at the last processed bar.
    Cancelled,
}

/// Everything a finished run hands to downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub config: EngineConfig,
    pub gate: String,
    pub ledger: Ledger,
    pub initial_equity: f64,
    pub final_equity: f64,
    pub bars_processed: usize,
    pub rejections: Vec<RejectedEntry>,
    pub termination: Termination,
}

impl RunResult {
    pub fn trades(&self) -> &[ClosedTrade] {
        self.ledger.trades()
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        self.ledger.equity_curve()
    }

    pub fn total_fees(&self) -> f64 {
        self.trades().iter().map(ClosedTrade::total_fees).sum()
    }
}

/// Per-run state: equity, the position slot, the ledger.
///
/// Owned by exactly one run; nothing is shared between simulations.
#[derive(Debug)]
pub struct Simulation<G> {
    config: ValidatedConfig,
    policy: RiskPolicy,
    gate: G,
    machine: PositionMachine,
    ledger: Ledger,
    equity: f64,
    bars_processed: usize,
    last_bar: Option<Bar>,
    rejections: Vec<RejectedEntry>,
}

impl<G: SignalGate> Simulation<G> {
    pub fn new(config: ValidatedConfig, gate: G) -> Self {
        let policy = RiskPolicy::from_config(&config);
        let machine = PositionMachine::new(config.path_policy);
        let equity = config.initial_equity;
        Self {
            config,
            policy,
            gate,
            machine,
            ledger: Ledger::default(),
            equity,
            bars_processed: 0,
            last_bar: None,
            rejections: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn gate(&self) -> &G {
        &self.gate
    }

    /// Current realized equity (entry fee of an open position deducted).
    pub fn equity(&self) -> f64 {
        self.equity
    }

    pub fn position(&self) -> Option<&Position> {
        self.machine.position()
    }

    /// 0 or 1.
    pub fn open_positions(&self) -> usize {
        usize::from(self.machine.is_open())
    }

    /// Read-only view for progress reporting while the run continues.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn bars_processed(&self) -> usize {
        self.bars_processed
    }

    pub fn last_bar(&self) -> Option<&Bar> {
        self.last_bar.as_ref()
    }

    pub fn rejections(&self) -> &[RejectedEntry] {
        &self.rejections
    }

    /// Process one bar. On `Err` nothing was mutated and the run must stop.
    pub fn step(&mut self, bar: Bar) -> Result<BarOutcome, EngineError> {
        let index = self.bars_processed;
        self.check_bar(index, &bar)?;

        self.gate.observe(&bar);
        let mut outcome = BarOutcome {
            index,
            ..BarOutcome::default()
        };

        if let Some((position, signal)) = self.machine.check_exit(&bar) {
            let trade = self.book_exit(position, signal.reason, signal.price, &bar, index);
            outcome.exit = Some(trade);
        }

        if !self.machine.is_open() {
            if let GateDecision::EnterLong(hint) = self.gate.decide(&bar) {
                match self.try_enter(index, &bar, hint) {
                    Ok(position) => outcome.entry = Some(position),
                    Err(reason) => {
                        debug!(index, timestamp = %bar.timestamp, %reason, "entry rejected");
                        self.rejections.push(RejectedEntry {
                            index,
                            timestamp: bar.timestamp,
                            reason: reason.clone(),
                        });
                        outcome.rejection = Some(reason);
                    }
                }
            }
        }

        self.ledger.record_equity(EquityPoint {
            timestamp: bar.timestamp,
            equity: self.equity,
            position_open: self.machine.is_open(),
        });
        self.bars_processed += 1;
        self.last_bar = Some(bar);
        outcome.equity = self.equity;
        Ok(outcome)
    }

    /// Close any open position at the last processed close (END_OF_DATA)
    /// and hand back the run.
    pub fn finish(self) -> RunResult {
        self.finalize(Termination::EndOfData)
    }

    /// Same settlement as [`finish`](Self::finish), recorded as a cancelled run.
    pub fn cancel(self) -> RunResult {
        self.finalize(Termination::Cancelled)
    }

    /// Pull bars from `source` until it is exhausted or `cancel` is raised.
    ///
    /// Cancellation is checked between bars only; a cancelled run is
    /// finalized exactly like an exhausted one at the last processed bar.
    pub fn drive<S: BarSource>(
        mut self,
        mut source: S,
        cancel: Option<&AtomicBool>,
    ) -> Result<RunResult, EngineError> {
        if self.bars_processed == 0 {
            if let Some(bars) = source.size_hint() {
                self.ledger = Ledger::with_capacity(bars);
            }
        }
        loop {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                warn!(
                    bars = self.bars_processed,
                    "run cancelled, finalizing at last processed bar"
                );
                return Ok(self.cancel());
            }
            let bar = source.next_bar().map_err(|source| EngineError::Source {
                bars_read: self.bars_processed,
                source,
            })?;
            match bar {
                Some(bar) => {
                    self.step(bar)?;
                }
                None => return Ok(self.finish()),
            }
        }
    }

    fn check_bar(&self, index: usize, bar: &Bar) -> Result<(), EngineError> {
        bar.validate().map_err(|source| EngineError::DataIntegrity {
            index,
            timestamp: bar.timestamp,
            source,
        })?;
        let Some(prev) = &self.last_bar else {
            return Ok(());
        };
        if bar.timestamp <= prev.timestamp {
            return Err(EngineError::OutOfOrder {
                index,
                previous: prev.timestamp,
                timestamp: bar.timestamp,
            });
        }
        if let Some(interval_secs) = self.config.bar_interval_secs {
            let delta = (bar.timestamp - prev.timestamp).num_seconds();
            let on_grid = (bar.timestamp - prev.timestamp).subsec_nanos() == 0
                && delta % interval_secs == 0;
            if !on_grid {
                return Err(EngineError::IrregularInterval {
                    index,
                    previous: prev.timestamp,
                    timestamp: bar.timestamp,
                    interval_secs,
                });
            }
        }
        Ok(())
    }

    /// FLAT → OPEN at the bar's close. Levels, size and fee are all computed
    /// before anything is mutated; equity and position change together.
    fn try_enter(
        &mut self,
        index: usize,
        bar: &Bar,
        hint: EntryHint,
    ) -> Result<Position, EntryRejection> {
        let entry_price = bar.close;
        let levels = compute_levels(&self.config.levels, entry_price, hint.volatility)?;
        let size = self
            .policy
            .position_size(self.equity, entry_price, levels.stop_loss)?;
        let entry_fee = self.policy.fee(size, entry_price);

        let position = Position {
            direction: Direction::Long,
            entry_time: bar.timestamp,
            entry_index: index,
            entry_price,
            size,
            stop_loss: levels.stop_loss,
            take_profit: levels.take_profit,
            entry_fee,
            equity_before: self.equity,
            confidence: hint.confidence,
        };
        self.machine.open(position.clone())?;
        self.equity -= entry_fee;
        debug!(
            index,
            timestamp = %bar.timestamp,
            price = entry_price,
            size,
            stop = levels.stop_loss,
            target = levels.take_profit,
            "entered long"
        );
        Ok(position)
    }

    /// OPEN → FLAT bookkeeping: one ledger entry, one equity update.
    fn book_exit(
        &mut self,
        position: Position,
        reason: ExitReason,
        exit_price: f64,
        bar: &Bar,
        index: usize,
    ) -> ClosedTrade {
        let exit_fee = self.policy.fee(position.size, exit_price);
        let gross_pnl = realized_pnl(position.size, position.entry_price, exit_price);
        let equity_after = position.equity_before - position.entry_fee - exit_fee + gross_pnl;

        let trade = ClosedTrade {
            direction: position.direction,
            entry_time: position.entry_time,
            exit_time: bar.timestamp,
            entry_price: position.entry_price,
            exit_price,
            size: position.size,
            stop_loss: position.stop_loss,
            take_profit: position.take_profit,
            exit_reason: reason,
            gross_pnl,
            entry_fee: position.entry_fee,
            exit_fee,
            equity_before: position.equity_before,
            equity_after,
            bars_held: index - position.entry_index,
        };
        self.equity = equity_after;
        self.ledger.record_trade(trade.clone());
        debug!(
            index,
            timestamp = %bar.timestamp,
            %reason,
            price = exit_price,
            pnl = trade.net_pnl(),
            equity = equity_after,
            "closed position"
        );
        trade
    }

    fn finalize(mut self, termination: Termination) -> RunResult {
        if let Some(last) = self.last_bar {
            if let Some(position) = self.machine.liquidate() {
                let index = self.bars_processed.saturating_sub(1);
                self.book_exit(position, ExitReason::EndOfData, last.close, &last, index);
                self.ledger.record_equity(EquityPoint {
                    timestamp: last.timestamp,
                    equity: self.equity,
                    position_open: false,
                });
            }
        }

        let result = RunResult {
            gate: self.gate.name().to_string(),
            initial_equity: self.config.initial_equity,
            final_equity: self.equity,
            bars_processed: self.bars_processed,
            rejections: self.rejections,
            termination,
            ledger: self.ledger,
            config: self.config.into_inner(),
        };
        info!(
            gate = %result.gate,
            bars = result.bars_processed,
            trades = result.trades().len(),
            rejected = result.rejections.len(),
            final_equity = result.final_equity,
            "run finished"
        );
        result
    }
}

/// Run a whole bar slice in one call.
pub fn run_batch<G: SignalGate>(
    config: ValidatedConfig,
    gate: G,
    bars: &[Bar],
) -> Result<RunResult, EngineError> {
    Simulation::new(config, gate).drive(SliceSource::new(bars), None)
}

/// Run from any source, honouring a cancellation flag between bars.
pub fn run_source<G: SignalGate, S: BarSource>(
    config: ValidatedConfig,
    gate: G,
    source: S,
    cancel: Option<&AtomicBool>,
) -> Result<RunResult, EngineError> {
    Simulation::new(config, gate).drive(source, cancel)
}
