//! Artifact export — trade tape, equity curve and run summary on disk.
//!
//! One directory per run, named by its run id:
//! - `summary.json` — `BacktestSummary` with schema version
//! - `trades.csv` — one row per closed trade
//! - `equity.csv` — one row per equity point
//!
//! Timestamps are RFC 3339. Floats go through the CSV serializer's shortest
//! round-trip formatting, so reading a file back yields the same bits.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tradesim_core::{ClosedTrade, EquityPoint};

use crate::robustness::RobustnessRow;
use crate::runner::{BacktestOutcome, BacktestSummary, SCHEMA_VERSION};
use crate::walk_forward::WalkForwardReport;

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_summary_json(summary: &BacktestSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).context("failed to serialize summary to JSON")
}

/// Parse a summary, rejecting schema versions newer than this build.
pub fn import_summary_json(json: &str) -> Result<BacktestSummary> {
    let summary: BacktestSummary =
        serde_json::from_str(json).context("failed to deserialize summary JSON")?;
    if summary.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            summary.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(summary)
}

// ─── CSV ────────────────────────────────────────────────────────────

pub fn write_trades_csv<W: Write>(writer: W, trades: &[ClosedTrade]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    if trades.is_empty() {
        wtr.write_record(TRADE_COLUMNS)?;
    }
    for trade in trades {
        wtr.serialize(trade).context("failed to write trade row")?;
    }
    wtr.flush().context("failed to flush trades CSV")?;
    Ok(())
}

pub fn read_trades_csv<R: Read>(reader: R) -> Result<Vec<ClosedTrade>> {
    csv::Reader::from_reader(reader)
        .deserialize()
        .enumerate()
        .map(|(i, row)| row.with_context(|| format!("bad trade row {}", i + 1)))
        .collect()
}

pub fn write_equity_csv<W: Write>(writer: W, curve: &[EquityPoint]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    if curve.is_empty() {
        wtr.write_record(["timestamp", "equity", "position_open"])?;
    }
    for point in curve {
        wtr.serialize(point).context("failed to write equity row")?;
    }
    wtr.flush().context("failed to flush equity CSV")?;
    Ok(())
}

pub fn read_equity_csv<R: Read>(reader: R) -> Result<Vec<EquityPoint>> {
    csv::Reader::from_reader(reader)
        .deserialize()
        .enumerate()
        .map(|(i, row)| row.with_context(|| format!("bad equity row {}", i + 1)))
        .collect()
}

/// Header used when there are no trades to derive it from.
const TRADE_COLUMNS: [&str; 15] = [
    "direction",
    "entry_time",
    "exit_time",
    "entry_price",
    "exit_price",
    "size",
    "stop_loss",
    "take_profit",
    "exit_reason",
    "gross_pnl",
    "entry_fee",
    "exit_fee",
    "equity_before",
    "equity_after",
    "bars_held",
];

// ─── Artifact bundle ────────────────────────────────────────────────

fn create_file(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("failed to create {}", path.display()))
}

/// Write the three artifacts to `<output_dir>/<run_id>/` and return that path.
pub fn save_artifacts(outcome: &BacktestOutcome, output_dir: &Path) -> Result<PathBuf> {
    let run_dir = output_dir.join(&outcome.summary.run_id.0);
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let json = export_summary_json(&outcome.summary)?;
    let summary_path = run_dir.join("summary.json");
    fs::write(&summary_path, json)
        .with_context(|| format!("failed to write {}", summary_path.display()))?;

    write_trades_csv(create_file(&run_dir.join("trades.csv"))?, outcome.result.trades())?;
    write_equity_csv(
        create_file(&run_dir.join("equity.csv"))?,
        outcome.result.equity_curve(),
    )?;
    Ok(run_dir)
}

/// Artifacts read back from a run directory.
#[derive(Debug, Clone)]
pub struct LoadedArtifacts {
    pub summary: BacktestSummary,
    pub trades: Vec<ClosedTrade>,
    pub equity: Vec<EquityPoint>,
}

pub fn load_artifacts(run_dir: &Path) -> Result<LoadedArtifacts> {
    let summary_path = run_dir.join("summary.json");
    let json = fs::read_to_string(&summary_path)
        .with_context(|| format!("failed to read {}", summary_path.display()))?;
    let summary = import_summary_json(&json)?;

    let trades_path = run_dir.join("trades.csv");
    let trades = read_trades_csv(
        File::open(&trades_path).with_context(|| format!("failed to open {}", trades_path.display()))?,
    )?;
    let equity_path = run_dir.join("equity.csv");
    let equity = read_equity_csv(
        File::open(&equity_path).with_context(|| format!("failed to open {}", equity_path.display()))?,
    )?;
    Ok(LoadedArtifacts {
        summary,
        trades,
        equity,
    })
}

/// `walk_forward.csv` next to the run artifacts.
pub fn save_walk_forward(report: &WalkForwardReport, run_dir: &Path) -> Result<PathBuf> {
    let path = run_dir.join("walk_forward.csv");
    let mut wtr = csv::Writer::from_writer(create_file(&path)?);
    wtr.write_record([
        "window",
        "is_start",
        "is_end",
        "oos_end",
        "is_bars",
        "oos_bars",
        "is_trades",
        "oos_trades",
        "is_total_return",
        "is_max_drawdown",
        "oos_total_return",
        "oos_max_drawdown",
        "oos_win_rate",
    ])?;
    for w in &report.windows {
        wtr.write_record([
            w.bounds.window.to_string(),
            w.bounds.is_start.to_rfc3339(),
            w.bounds.is_end.to_rfc3339(),
            w.bounds.oos_end.to_rfc3339(),
            w.is_bars.to_string(),
            w.oos_bars.to_string(),
            w.is_trades.to_string(),
            w.oos_trades.to_string(),
            w.is_total_return.to_string(),
            w.is_max_drawdown.to_string(),
            w.oos_total_return.to_string(),
            w.oos_max_drawdown.to_string(),
            w.oos_win_rate.to_string(),
        ])?;
    }
    wtr.flush().context("failed to flush walk-forward CSV")?;
    Ok(path)
}

/// `robustness.csv` next to the run artifacts, in grid order.
pub fn save_robustness(rows: &[RobustnessRow], run_dir: &Path) -> Result<PathBuf> {
    let path = run_dir.join("robustness.csv");
    let mut wtr = csv::Writer::from_writer(create_file(&path)?);
    for row in rows {
        wtr.serialize(row).context("failed to write robustness row")?;
    }
    wtr.flush().context("failed to flush robustness CSV")?;
    Ok(path)
}

// ─── Text report ────────────────────────────────────────────────────

/// Plain-text summary for the terminal.
pub fn format_summary(summary: &BacktestSummary) -> String {
    let m = &summary.metrics;
    let range = match (summary.first_bar, summary.last_bar) {
        (Some(first), Some(last)) => format!("{} .. {}", first.to_rfc3339(), last.to_rfc3339()),
        _ => "(no bars)".to_string(),
    };
    let lines = [
        format!("Run {} [{}] gate={}", summary.run_id, summary.label, summary.gate),
        format!("Bars:              {} ({range})", summary.bars),
        format!("Initial equity:    {:.4}", m.initial_equity),
        format!("Final equity:      {:.4}", m.final_equity),
        format!("Total return:      {:+.2}%", m.total_return * 100.0),
        format!("Max drawdown:      {:.2}%", m.max_drawdown * 100.0),
        format!(
            "Trades:            {} (TP {}, SL {}, EOD {})",
            m.trade_count, m.take_profit_exits, m.stop_loss_exits, m.end_of_data_exits
        ),
        format!("Exit win rate:     {:.2}%", m.exit_win_rate * 100.0),
        format!("Trade win rate:    {:.2}%", m.trade_win_rate * 100.0),
        format!("Expectancy:        {:.4}", m.expectancy),
        format!("Profit factor:     {:.2}", m.profit_factor),
        format!("Sharpe:            {:.3}", m.sharpe),
        format!("Total fees:        {:.6}", m.total_fees),
        format!("Rejected entries:  {}", summary.rejected_entries),
    ];
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use tradesim_core::{Direction, ExitReason};

    fn sample_trade() -> ClosedTrade {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        ClosedTrade {
            direction: Direction::Long,
            entry_time: t0,
            exit_time: t0 + Duration::hours(7),
            entry_price: 3509.73,
            exit_price: 3421.0999999999995,
            size: 1.423,
            stop_loss: 3421.0999999999995,
            take_profit: 3686.99,
            exit_reason: ExitReason::StopLoss,
            gross_pnl: -126.12049000000071,
            entry_fee: 4.99434579,
            exit_fee: 4.868225299999999,
            equity_before: 10_000.0,
            equity_after: 9864.016938910001,
            bars_held: 7,
        }
    }

    #[test]
    fn trades_csv_reads_back_exactly() {
        let trades = vec![sample_trade()];
        let mut buf = Vec::new();
        write_trades_csv(&mut buf, &trades).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.lines().next().unwrap().starts_with("direction,entry_time,exit_time"));
        assert!(text.contains("STOP_LOSS"));
        assert!(text.contains("2024-03-01T12:00:00Z"));

        let back = read_trades_csv(buf.as_slice()).unwrap();
        assert_eq!(back, trades);
    }

    #[test]
    fn empty_trades_csv_has_header_only() {
        let mut buf = Vec::new();
        write_trades_csv(&mut buf, &[]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(read_trades_csv(text.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn equity_csv_reads_back_exactly() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let curve: Vec<EquityPoint> = (0..5)
            .map(|i| EquityPoint {
                timestamp: t0 + Duration::hours(i),
                equity: 10_000.0 - 0.1 * i as f64 / 3.0,
                position_open: i % 2 == 0,
            })
            .collect();
        let mut buf = Vec::new();
        write_equity_csv(&mut buf, &curve).unwrap();
        assert_eq!(read_equity_csv(buf.as_slice()).unwrap(), curve);
    }
}
