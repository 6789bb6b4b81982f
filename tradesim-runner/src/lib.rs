//! Tradesim Runner — everything around the engine that touches files or
//! repeats runs.
//!
//! This crate builds on `tradesim-core` to provide:
//! - TOML run configuration
//! - CSV bar loading, batch and streaming
//! - Performance metrics from the ledger
//! - Full, out-of-sample, walk-forward and robustness runs
//! - Live replay with trade events and progress logging
//! - Artifact export (CSV + JSON) keyed by run fingerprint

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod replay;
pub mod robustness;
pub mod runner;
pub mod walk_forward;

pub use config::{BacktestConfig, ConfigFileError, GateSection, ReplayConfig, WalkForwardConfig};
pub use data_loader::{load_bars_csv, slice_by_time, CsvBarSource, LoadError};
pub use metrics::{PerformanceMetrics, DEFAULT_PERIODS_PER_YEAR};
pub use replay::{LiveReplay, ReplayReport, RunStats, TradeEvent};
pub use robustness::{run_robustness, RobustnessRow};
pub use runner::{
    precompute_decisions, run_backtest, run_oos, BacktestOutcome, BacktestSummary, GateFactory,
    RunError, SCHEMA_VERSION,
};
pub use walk_forward::{run_walk_forward, WalkForwardError, WalkForwardReport, WindowResult};
