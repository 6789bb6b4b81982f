//! Backtest runner — builds gates, runs the engine, attaches metrics and
//! fingerprints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use tradesim_core::engine::Termination;
use tradesim_core::fingerprint::{self, DatasetHash, RunId};
use tradesim_core::gate::{
    EntryHint, GateDecision, LogisticModel, ModelError, PullbackGate, ScriptedGate,
    TradeQualityModel,
};
use tradesim_core::{
    run_batch, Bar, EngineConfig, EngineError, RunResult, SignalGate, ValidatedConfig,
};

use crate::config::{ConfigFileError, GateSection};
use crate::data_loader::LoadError;
use crate::metrics::PerformanceMetrics;

/// Errors from running a backtest.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigFileError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("cannot load model {path}: {reason}")]
    Model { path: PathBuf, reason: String },
    #[error("fingerprint failed: {0}")]
    Fingerprint(#[from] serde_json::Error),
    #[error("no bars to run on ({0})")]
    NoBars(&'static str),
}

/// Current schema version for persisted summaries.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Summary of one run, serialized next to the trade and equity CSVs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub label: String,
    pub gate: String,
    pub config: EngineConfig,
    pub dataset_hash: DatasetHash,
    pub bars: usize,
    pub first_bar: Option<DateTime<Utc>>,
    pub last_bar: Option<DateTime<Utc>>,
    pub termination: Termination,
    pub rejected_entries: usize,
    pub metrics: PerformanceMetrics,
}

/// A finished run plus its summary.
#[derive(Debug, Clone)]
pub struct BacktestOutcome {
    pub summary: BacktestSummary,
    pub result: RunResult,
}

// ─── Gates ──────────────────────────────────────────────────────────

/// Load logistic weights from a JSON file.
pub fn load_model(path: &Path) -> Result<Arc<dyn TradeQualityModel>, RunError> {
    let model_err = |reason: String| RunError::Model {
        path: path.to_path_buf(),
        reason,
    };
    let file = File::open(path).map_err(|e| model_err(e.to_string()))?;
    let model = LogisticModel::from_reader(file).map_err(|e: ModelError| model_err(e.to_string()))?;
    Ok(Arc::new(model))
}

/// Builds identical, fresh pullback gates from the `[gate]` section.
#[derive(Clone)]
pub struct GateFactory {
    section: GateSection,
    model: Option<Arc<dyn TradeQualityModel>>,
}

impl std::fmt::Debug for GateFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateFactory")
            .field("section", &self.section)
            .field("has_model", &self.model.is_some())
            .finish()
    }
}

impl GateFactory {
    /// Loads the model file if one is configured. No model means rule-only.
    pub fn from_section(section: &GateSection) -> Result<Self, RunError> {
        let model = match &section.model_path {
            Some(path) => Some(load_model(path)?),
            None => None,
        };
        Ok(Self {
            section: section.clone(),
            model,
        })
    }

    pub fn with_model(section: &GateSection, model: Option<Arc<dyn TradeQualityModel>>) -> Self {
        Self {
            section: section.clone(),
            model,
        }
    }

    pub fn build(&self) -> PullbackGate {
        let gate = PullbackGate::new(self.section.rules);
        match &self.model {
            Some(model) => gate.with_filter(Arc::clone(model), self.section.threshold),
            None => gate,
        }
    }
}

/// Evaluate `gate` causally over every bar and freeze its entry decisions.
///
/// Gate decisions never depend on position state, so the frozen gate drives
/// any sub-range of `bars` exactly as the live gate would, with indicator
/// history carried in from before the sub-range.
pub fn precompute_decisions<G: SignalGate>(mut gate: G, bars: &[Bar]) -> ScriptedGate {
    let entries: Vec<(DateTime<Utc>, EntryHint)> = bars
        .iter()
        .filter_map(|bar| {
            gate.observe(bar);
            match gate.decide(bar) {
                GateDecision::EnterLong(hint) => Some((bar.timestamp, hint)),
                GateDecision::NoSignal => None,
            }
        })
        .collect();
    ScriptedGate::from_entries(entries)
}

// ─── Runs ───────────────────────────────────────────────────────────

/// Run the engine over `bars` and summarize.
pub fn run_backtest<G: SignalGate>(
    config: ValidatedConfig,
    gate: G,
    bars: &[Bar],
    label: &str,
    periods_per_year: f64,
) -> Result<BacktestOutcome, RunError> {
    let config_hash = fingerprint::config_hash(&config)?;
    let dataset_hash = fingerprint::dataset_hash(bars);
    let run_id = fingerprint::run_id(&config_hash, &dataset_hash, label);

    let result = run_batch(config, gate, bars)?;
    let metrics = PerformanceMetrics::compute(&result, periods_per_year);
    info!(
        %run_id,
        label,
        bars = result.bars_processed,
        trades = metrics.trade_count,
        total_return = metrics.total_return,
        max_drawdown = metrics.max_drawdown,
        "backtest complete"
    );

    let summary = BacktestSummary {
        schema_version: SCHEMA_VERSION,
        run_id,
        label: label.to_string(),
        gate: result.gate.clone(),
        config: result.config.clone(),
        dataset_hash,
        bars: result.bars_processed,
        first_bar: bars.first().map(|b| b.timestamp),
        last_bar: bars.last().map(|b| b.timestamp),
        termination: result.termination,
        rejected_entries: result.rejections.len(),
        metrics,
    };
    Ok(BacktestOutcome { summary, result })
}

/// The test portion: bars from index ⌊len × train_pct⌋ onwards.
pub fn oos_slice(bars: &[Bar], train_pct: f64) -> &[Bar] {
    let split = ((bars.len() as f64) * train_pct).floor() as usize;
    &bars[split.min(bars.len())..]
}

/// Out-of-sample run on the last (1 − train_pct) of the bars.
///
/// The gate sees the whole history (decisions are causal), the engine only
/// the test slice.
pub fn run_oos<G: SignalGate>(
    config: ValidatedConfig,
    gate: G,
    bars: &[Bar],
    train_pct: f64,
    periods_per_year: f64,
) -> Result<BacktestOutcome, RunError> {
    let test = oos_slice(bars, train_pct);
    if test.is_empty() {
        return Err(RunError::NoBars("out-of-sample slice is empty"));
    }
    info!(
        train = bars.len() - test.len(),
        test = test.len(),
        "out-of-sample split"
    );
    let decisions = precompute_decisions(gate, bars);
    run_backtest(config, decisions, test, "oos", periods_per_year)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tradesim_core::gate::PullbackRules;

    fn bars(n: usize) -> Vec<Bar> {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let c = 100.0 + i as f64 * 0.05 + (i as f64 * 0.3).sin();
                Bar::new(t0 + Duration::hours(i as i64), c, c + 0.8, c - 0.8, c, 10.0 + (i % 5) as f64)
            })
            .collect()
    }

    #[test]
    fn oos_slice_takes_the_tail() {
        let data = bars(10);
        let test = oos_slice(&data, 0.7);
        assert_eq!(test.len(), 3);
        assert_eq!(test[0].timestamp, data[7].timestamp);
    }

    #[test]
    fn precomputed_gate_reproduces_live_gate() {
        let data = bars(400);
        let factory = GateFactory::with_model(&GateSection::default(), None);
        let config = || EngineConfig::default().validate().unwrap();

        let live = run_batch(config(), factory.build(), &data).unwrap();
        let frozen = precompute_decisions(factory.build(), &data);
        let replayed = run_batch(config(), frozen, &data).unwrap();
        assert_eq!(live.ledger, replayed.ledger);
    }

    #[test]
    fn summary_carries_fingerprint_and_metrics() {
        let data = bars(200);
        let factory = GateFactory::with_model(
            &GateSection {
                rules: PullbackRules::default(),
                model_path: None,
                threshold: 0.6,
            },
            None,
        );
        let outcome = run_backtest(
            EngineConfig::default().validate().unwrap(),
            factory.build(),
            &data,
            "full",
            8760.0,
        )
        .unwrap();
        assert_eq!(outcome.summary.bars, 200);
        assert_eq!(outcome.summary.run_id.0.len(), 16);
        assert_eq!(outcome.summary.gate, "pullback");
        assert_eq!(outcome.summary.metrics.trade_count, outcome.result.trades().len());
    }

    #[test]
    fn missing_model_file_is_reported() {
        let section = GateSection {
            model_path: Some(PathBuf::from("/nonexistent/model.json")),
            ..GateSection::default()
        };
        assert!(matches!(
            GateFactory::from_section(&section),
            Err(RunError::Model { .. })
        ));
    }
}
