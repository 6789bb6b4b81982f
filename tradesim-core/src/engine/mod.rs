//! Simulation engine — position state machine, driver, ledger.
//!
//! Single-threaded and strictly sequential: one bar at a time, in timestamp
//! order, no look-ahead. Independent runs share nothing and may run on
//! separate threads.

pub mod driver;
pub mod error;
pub mod ledger;
pub mod position_machine;
pub mod source;

pub use driver::{
    run_batch, run_source, BarOutcome, RejectedEntry, RunResult, Simulation, Termination,
};
pub use error::EngineError;
pub use ledger::Ledger;
pub use position_machine::{evaluate_exit, ExitSignal, PositionMachine, PositionState};
pub use source::{BarSource, SliceSource, SourceError, VecSource};
