//! Tradesim CLI — backtest and replay commands.
//!
//! Commands:
//! - `backtest` — full run on a CSV file, optionally with out-of-sample,
//!   walk-forward and robustness runs; artifacts saved per run id
//! - `replay` — stream the CSV one bar at a time and print trade events

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tradesim_runner::export::{format_summary, save_artifacts, save_robustness, save_walk_forward};
use tradesim_runner::{
    load_bars_csv, precompute_decisions, run_backtest, run_oos, run_robustness, run_walk_forward,
    BacktestConfig, CsvBarSource, GateFactory, LiveReplay, RobustnessRow, TradeEvent,
    WalkForwardReport, DEFAULT_PERIODS_PER_YEAR,
};

#[derive(Parser)]
#[command(name = "tradesim", about = "Tradesim — event-driven trade simulation over OHLCV bars")]
struct Cli {
    /// Log level used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest a CSV file and save artifacts.
    Backtest {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// CSV with timestamp,open,high,low,close,volume.
        #[arg(long)]
        data: PathBuf,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Also run on the held-out tail of the data.
        #[arg(long, default_value_t = false)]
        oos: bool,

        /// Also run walk-forward windows.
        #[arg(long, default_value_t = false)]
        walk_forward: bool,

        /// Also sweep the stop/target multiplier grid.
        #[arg(long, default_value_t = false)]
        robustness: bool,

        /// Bars per year, for annualising Sharpe. Defaults to hourly.
        #[arg(long, default_value_t = DEFAULT_PERIODS_PER_YEAR)]
        periods_per_year: f64,
    },
    /// Replay a CSV file bar by bar.
    Replay {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// CSV with timestamp,open,high,low,close,volume.
        #[arg(long)]
        data: PathBuf,

        /// Pause between bars (overrides `[replay] delay_ms`).
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Print events as JSON lines.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .with_context(|| format!("invalid log level '{}'", cli.log_level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Backtest {
            config,
            data,
            output_dir,
            oos,
            walk_forward,
            robustness,
            periods_per_year,
        } => run_backtest_cmd(
            &config,
            &data,
            &output_dir,
            oos,
            walk_forward,
            robustness,
            periods_per_year,
        ),
        Commands::Replay {
            config,
            data,
            delay_ms,
            json,
        } => run_replay_cmd(&config, &data, delay_ms, json),
    }
}

fn load_config(path: &Path) -> Result<BacktestConfig> {
    BacktestConfig::load(path).with_context(|| format!("failed to load config {}", path.display()))
}

fn run_backtest_cmd(
    config_path: &Path,
    data_path: &Path,
    output_dir: &Path,
    oos: bool,
    walk_forward: bool,
    robustness: bool,
    periods_per_year: f64,
) -> Result<()> {
    let config = load_config(config_path)?;
    let engine = config.engine()?;
    let bars = load_bars_csv(data_path)
        .with_context(|| format!("failed to load bars from {}", data_path.display()))?;
    let gates = GateFactory::from_section(&config.gate)?;
    info!(bars = bars.len(), gate = ?gates, "loaded inputs");

    let full = run_backtest(engine.clone(), gates.build(), &bars, "full", periods_per_year)
        .context("full backtest failed")?;
    println!("{}", format_summary(&full.summary));
    let run_dir = save_artifacts(&full, output_dir)?;
    println!("Artifacts saved to: {}\n", run_dir.display());

    if oos {
        let outcome = run_oos(
            engine.clone(),
            gates.build(),
            &bars,
            config.oos.train_pct,
            periods_per_year,
        )
        .context("out-of-sample backtest failed")?;
        println!("{}", format_summary(&outcome.summary));
        let dir = save_artifacts(&outcome, output_dir)?;
        println!("Artifacts saved to: {}\n", dir.display());
    }

    if walk_forward || robustness {
        let decisions = precompute_decisions(gates.build(), &bars);

        if walk_forward {
            let report = run_walk_forward(&engine, &decisions, &bars, &config.walk_forward)
                .context("walk-forward failed")?;
            print_walk_forward(&report);
            let path = save_walk_forward(&report, &run_dir)?;
            println!("Saved {}\n", path.display());
        }

        if robustness {
            let rows = run_robustness(&engine, &decisions, &bars, &config.robustness)
                .context("robustness sweep failed")?;
            print_robustness(&rows);
            let path = save_robustness(&rows, &run_dir)?;
            println!("Saved {}", path.display());
        }
    }

    Ok(())
}

fn run_replay_cmd(
    config_path: &Path,
    data_path: &Path,
    delay_ms: Option<u64>,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let engine = config.engine()?;
    let gates = GateFactory::from_section(&config.gate)?;
    let mut settings = config.replay.clone();
    if let Some(delay) = delay_ms {
        settings.delay_ms = delay;
    }
    let source = CsvBarSource::open(data_path)
        .with_context(|| format!("failed to open {}", data_path.display()))?;

    let mut write_err = None;
    let report = LiveReplay::new(engine, gates.build(), &settings)
        .run(
            source,
            |event: &TradeEvent| {
                if json {
                    match serde_json::to_string(event) {
                        Ok(line) => println!("{line}"),
                        Err(e) => {
                            write_err.get_or_insert(e);
                        }
                    }
                } else {
                    print_event(event);
                }
            },
            None,
        )
        .context("replay failed")?;
    if let Some(e) = write_err {
        return Err(e).context("failed to encode trade event");
    }

    let s = &report.stats;
    println!("\nFINAL STATISTICS");
    println!("{}", "=".repeat(60));
    println!("Initial equity:    {:.4}", report.result.initial_equity);
    println!("Final equity:      {:.4}", s.equity);
    println!("Total return:      {:+.2}%", s.total_return_pct);
    println!("Total trades:      {}", s.trades);
    println!("Winning trades:    {}", s.winners);
    println!("Losing trades:     {}", s.losers);
    println!("Win rate:          {:.2}%", s.win_rate * 100.0);
    println!("Total fees paid:   {:.6}", s.total_fees);
    println!("Open position:     {}", s.has_position);
    println!("Stopped by:        {:?}", report.result.termination);
    Ok(())
}

fn print_event(event: &TradeEvent) {
    match event {
        TradeEvent::Entry(p) => println!(
            "[{}] BUY @ {:.2}  size {:.4}  SL {:.2}  TP {:.2}  fee {:.6}",
            p.entry_time.to_rfc3339(),
            p.entry_price,
            p.size,
            p.stop_loss,
            p.take_profit,
            p.entry_fee
        ),
        TradeEvent::Exit(t) => println!(
            "[{}] {} @ {:.2}  pnl {:+.6} ({:+.2}%)  fee {:.6}  equity {:.4}",
            t.exit_time.to_rfc3339(),
            t.exit_reason,
            t.exit_price,
            t.net_pnl(),
            t.return_pct() * 100.0,
            t.exit_fee,
            t.equity_after
        ),
    }
}

fn print_walk_forward(report: &WalkForwardReport) {
    println!("Walk-forward ({} windows)", report.windows.len());
    println!(
        "{:>3}  {:<10}  {:<10}  {:>9}  {:>9}  {:>9}  {:>9}  {:>6}",
        "#", "IS start", "OOS start", "IS ret", "IS dd", "OOS ret", "OOS dd", "trades"
    );
    for w in &report.windows {
        println!(
            "{:>3}  {:<10}  {:<10}  {:>8.2}%  {:>8.2}%  {:>8.2}%  {:>8.2}%  {:>6}",
            w.bounds.window,
            w.bounds.is_start.format("%Y-%m-%d"),
            w.bounds.is_end.format("%Y-%m-%d"),
            w.is_total_return * 100.0,
            w.is_max_drawdown * 100.0,
            w.oos_total_return * 100.0,
            w.oos_max_drawdown * 100.0,
            w.oos_trades
        );
    }
    println!(
        "Mean OOS return {:+.2}%, positive in {:.0}% of windows",
        report.mean_oos_return * 100.0,
        report.oos_positive_fraction * 100.0
    );
}

fn print_robustness(rows: &[RobustnessRow]) {
    println!("Robustness sweep ({} combinations)", rows.len());
    println!(
        "{:>5}  {:>5}  {:>9}  {:>9}  {:>8}  {:>6}  {:>6}",
        "SL", "TP", "return", "max dd", "win", "PF", "trades"
    );
    for r in rows {
        println!(
            "{:>5.2}  {:>5.2}  {:>8.2}%  {:>8.2}%  {:>7.2}%  {:>6.2}  {:>6}",
            r.sl_mult,
            r.tp_mult,
            r.total_return * 100.0,
            r.max_drawdown * 100.0,
            r.win_rate * 100.0,
            r.profit_factor,
            r.trade_count
        );
    }
}
