//! Artifact export: files land under the run id and read back exactly.

mod common;

use common::{periodic_gate, synthetic};
use tradesim_core::EngineConfig;
use tradesim_runner::export::{import_summary_json, load_artifacts, save_artifacts, save_robustness};
use tradesim_runner::metrics::DEFAULT_PERIODS_PER_YEAR;
use tradesim_runner::robustness::run_robustness;
use tradesim_runner::config::RobustnessConfig;
use tradesim_runner::runner::{run_backtest, SCHEMA_VERSION};

#[test]
fn artifacts_round_trip() {
    let bars = synthetic(800);
    let outcome = run_backtest(
        EngineConfig::default().validate().unwrap(),
        periodic_gate(&bars, 11, 1.0),
        &bars,
        "full",
        DEFAULT_PERIODS_PER_YEAR,
    )
    .unwrap();
    assert!(!outcome.result.trades().is_empty());

    let out = tempfile::tempdir().unwrap();
    let run_dir = save_artifacts(&outcome, out.path()).unwrap();
    assert_eq!(run_dir, out.path().join(&outcome.summary.run_id.0));
    for name in ["summary.json", "trades.csv", "equity.csv"] {
        assert!(run_dir.join(name).is_file(), "missing {name}");
    }

    let loaded = load_artifacts(&run_dir).unwrap();
    assert_eq!(loaded.summary, outcome.summary);
    assert_eq!(loaded.trades, outcome.result.trades());
    assert_eq!(loaded.equity, outcome.result.equity_curve());
}

#[test]
fn same_inputs_same_run_directory() {
    let bars = synthetic(200);
    let run = || {
        run_backtest(
            EngineConfig::default().validate().unwrap(),
            periodic_gate(&bars, 9, 1.0),
            &bars,
            "full",
            DEFAULT_PERIODS_PER_YEAR,
        )
        .unwrap()
    };
    let a = run();
    let b = run();
    assert_eq!(a.summary.run_id, b.summary.run_id);
    assert_eq!(a.summary.dataset_hash, b.summary.dataset_hash);

    let other = run_backtest(
        EngineConfig::default().validate().unwrap(),
        periodic_gate(&bars, 9, 1.0),
        &bars,
        "oos",
        DEFAULT_PERIODS_PER_YEAR,
    )
    .unwrap();
    assert_ne!(a.summary.run_id, other.summary.run_id);
}

#[test]
fn newer_schema_is_rejected() {
    let bars = synthetic(50);
    let outcome = run_backtest(
        EngineConfig::default().validate().unwrap(),
        periodic_gate(&bars, 9, 1.0),
        &bars,
        "full",
        DEFAULT_PERIODS_PER_YEAR,
    )
    .unwrap();
    let mut summary = outcome.summary;
    summary.schema_version = SCHEMA_VERSION + 1;
    let json = serde_json::to_string(&summary).unwrap();
    let err = import_summary_json(&json).unwrap_err();
    assert!(err.to_string().contains("unsupported schema version"));
}

#[test]
fn robustness_csv_keeps_grid_order() {
    let bars = synthetic(400);
    let base = EngineConfig::default().validate().unwrap();
    let rows = run_robustness(
        &base,
        &periodic_gate(&bars, 10, 1.0),
        &bars,
        &RobustnessConfig::default(),
    )
    .unwrap();

    let out = tempfile::tempdir().unwrap();
    let path = save_robustness(&rows, out.path()).unwrap();
    let text = std::fs::read_to_string(path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 10);
    assert!(lines[0].starts_with("sl_mult,tp_mult,"));
    assert!(lines[1].starts_with("1.2,2.4,"));
    assert!(lines[9].starts_with("1.8,3.6,"));
}
