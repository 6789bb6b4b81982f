//! Live replay — the batch engine fed one bar at a time.
//!
//! `LiveReplay` wraps the same `Simulation` a backtest uses and only adds
//! pacing, trade events and progress logging around `Simulation::step`, so a
//! replay over a bar sequence produces the ledger a batch run would.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use tradesim_core::{
    Bar, BarOutcome, BarSource, ClosedTrade, EngineError, Position, RunResult, SignalGate,
    Simulation, ValidatedConfig,
};

use crate::config::ReplayConfig;

/// A fill reported to the replay callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeEvent {
    Entry(Position),
    Exit(ClosedTrade),
}

/// Running statistics, available mid-run and at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub equity: f64,
    pub total_return_pct: f64,
    pub trades: usize,
    pub winners: usize,
    pub losers: usize,
    pub win_rate: f64,
    pub total_fees: f64,
    pub has_position: bool,
}

impl RunStats {
    fn collect(
        initial_equity: f64,
        equity: f64,
        trades: &[ClosedTrade],
        open: Option<&Position>,
    ) -> Self {
        let winners = trades.iter().filter(|t| t.is_winner()).count();
        let closed_fees: f64 = trades.iter().map(|t| t.total_fees()).sum();
        let open_fee = open.map_or(0.0, |p| p.entry_fee);
        Self {
            equity,
            total_return_pct: (equity / initial_equity - 1.0) * 100.0,
            trades: trades.len(),
            winners,
            losers: trades.len() - winners,
            win_rate: if trades.is_empty() {
                0.0
            } else {
                winners as f64 / trades.len() as f64
            },
            total_fees: closed_fees + open_fee,
            has_position: open.is_some(),
        }
    }

    pub fn from_result(result: &RunResult) -> Self {
        Self::collect(result.initial_equity, result.final_equity, result.trades(), None)
    }
}

/// Result of a finished replay.
#[derive(Debug, Clone)]
pub struct ReplayReport {
    pub result: RunResult,
    pub stats: RunStats,
}

pub struct LiveReplay<G> {
    sim: Simulation<G>,
    delay: Option<Duration>,
    progress_every: usize,
    lookback: usize,
    recent: VecDeque<Bar>,
}

impl<G: SignalGate> LiveReplay<G> {
    pub fn new(config: ValidatedConfig, gate: G, settings: &ReplayConfig) -> Self {
        let delay = (settings.delay_ms > 0).then(|| Duration::from_millis(settings.delay_ms));
        Self {
            sim: Simulation::new(config, gate),
            delay,
            progress_every: settings.progress_every,
            lookback: settings.lookback,
            recent: VecDeque::with_capacity(settings.lookback),
        }
    }

    pub fn simulation(&self) -> &Simulation<G> {
        &self.sim
    }

    /// The last `lookback` bars seen, oldest first.
    pub fn recent_bars(&self) -> &VecDeque<Bar> {
        &self.recent
    }

    pub fn stats(&self) -> RunStats {
        RunStats::collect(
            self.sim.config().initial_equity,
            self.sim.equity(),
            self.sim.ledger().trades(),
            self.sim.position(),
        )
    }

    /// Feed one bar. Events fire in engine order: exit first, then entry.
    pub fn on_bar<F>(&mut self, bar: Bar, on_event: &mut F) -> Result<BarOutcome, EngineError>
    where
        F: FnMut(&TradeEvent),
    {
        let outcome = self.sim.step(bar)?;
        if self.lookback > 0 {
            if self.recent.len() == self.lookback {
                self.recent.pop_front();
            }
            self.recent.push_back(bar);
        }

        if let Some(trade) = &outcome.exit {
            on_event(&TradeEvent::Exit(trade.clone()));
        }
        if let Some(position) = &outcome.entry {
            on_event(&TradeEvent::Entry(position.clone()));
        }

        let processed = self.sim.bars_processed();
        if self.progress_every > 0 && processed % self.progress_every == 0 {
            let stats = self.stats();
            info!(
                bars = processed,
                timestamp = %bar.timestamp,
                equity = stats.equity,
                trades = stats.trades,
                open = stats.has_position,
                "replay progress"
            );
        }
        Ok(outcome)
    }

    /// Pull bars until the source is exhausted or `cancel` is raised, then
    /// settle any open position at the last processed close.
    pub fn run<S, F>(
        mut self,
        mut source: S,
        mut on_event: F,
        cancel: Option<&AtomicBool>,
    ) -> Result<ReplayReport, EngineError>
    where
        S: BarSource,
        F: FnMut(&TradeEvent),
    {
        info!(
            initial_equity = self.sim.config().initial_equity,
            risk_pct = self.sim.config().risk_pct,
            fee_rate = self.sim.config().fee_rate,
            "replay started"
        );
        let cancelled = loop {
            if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
                break true;
            }
            let next = source.next_bar().map_err(|source| EngineError::Source {
                bars_read: self.sim.bars_processed(),
                source,
            })?;
            let Some(bar) = next else {
                break false;
            };
            self.on_bar(bar, &mut on_event)?;
            if let Some(delay) = self.delay {
                thread::sleep(delay);
            }
        };

        let closed_before = self.sim.ledger().trades().len();
        let result = if cancelled {
            warn!(bars = self.sim.bars_processed(), "replay cancelled");
            self.sim.cancel()
        } else {
            self.sim.finish()
        };
        if let Some(trade) = result.trades().get(closed_before) {
            on_event(&TradeEvent::Exit(trade.clone()));
        }

        let stats = RunStats::from_result(&result);
        info!(
            final_equity = stats.equity,
            total_return_pct = stats.total_return_pct,
            trades = stats.trades,
            winners = stats.winners,
            losers = stats.losers,
            total_fees = stats.total_fees,
            "replay finished"
        );
        Ok(ReplayReport { result, stats })
    }
}
