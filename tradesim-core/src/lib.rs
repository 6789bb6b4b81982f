//! Tradesim Core — event-driven trade simulation over OHLCV bars.
//!
//! - Domain types (bars, positions, closed trades, equity points)
//! - Validated, immutable engine configuration
//! - Fixed-fractional risk sizing with proportional fees
//! - FLAT/OPEN position state machine with a configurable same-bar tie-break
//! - One simulation driver shared by batch runs and live replay
//! - Append-only trade/equity ledger
//! - Signal gate seam, streaming indicators, pullback rules, probability filter

pub mod config;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod gate;
pub mod indicators;
pub mod sizing;

pub use config::{ConfigError, EngineConfig, LevelRule, PathPolicy, ValidatedConfig};
pub use domain::{Bar, BarError, ClosedTrade, Direction, EquityPoint, ExitReason, Position};
pub use engine::{
    run_batch, run_source, BarOutcome, BarSource, EngineError, Ledger, RunResult, Simulation,
    SliceSource, SourceError, Termination, VecSource,
};
pub use gate::{EntryHint, GateDecision, SignalGate};
pub use sizing::{EntryRejection, RiskPolicy};

#[cfg(test)]
mod tests {
    use super::*;

    /// Runs are moved onto rayon workers; everything a run owns must be Send.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Bar>();
        require_sync::<Bar>();
        require_send::<EngineConfig>();
        require_sync::<EngineConfig>();
        require_send::<RunResult>();
        require_sync::<RunResult>();
        require_send::<Simulation<gate::PullbackGate>>();
        require_send::<Simulation<gate::ScriptedGate>>();
        require_send::<EngineError>();
    }

    #[test]
    fn gate_trait_is_object_safe() {
        fn _boxed(gate: Box<dyn SignalGate>, config: ValidatedConfig) -> Simulation<Box<dyn SignalGate>> {
            Simulation::new(config, gate)
        }
    }
}
