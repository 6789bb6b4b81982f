//! Synthetic bars and CSV fixtures shared by the runner integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::io::Write;
use std::path::Path;
use tradesim_core::gate::{EntryHint, ScriptedGate};
use tradesim_core::Bar;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Deterministic hourly bars: two overlapping cycles on a gentle drift.
pub fn synthetic(n: usize) -> Vec<Bar> {
    let mut prev = 100.0_f64;
    (0..n)
        .map(|i| {
            let x = i as f64;
            let close = 100.0 + 0.002 * x + 5.0 * (x / 24.0).sin() + 2.0 * (x / 7.3).sin();
            let open = prev;
            let high = open.max(close) + 0.6 + 0.3 * (x * 1.7).sin().abs();
            let low = open.min(close) - 0.6 - 0.3 * (x * 0.9).cos().abs();
            prev = close;
            Bar::new(
                t0() + Duration::hours(i as i64),
                open,
                high,
                low,
                close,
                10.0 + (i % 7) as f64,
            )
        })
        .collect()
}

/// Enter every `every` bars with a fixed volatility hint.
pub fn periodic_gate(bars: &[Bar], every: usize, volatility: f64) -> ScriptedGate {
    ScriptedGate::from_entries(
        bars.iter()
            .step_by(every)
            .map(|b| (b.timestamp, EntryHint::with_volatility(volatility))),
    )
}

/// Write bars as `timestamp,open,high,low,close,volume` with RFC 3339 times.
pub fn write_csv(path: &Path, bars: &[Bar]) {
    let mut file = std::fs::File::create(path).unwrap();
    writeln!(file, "timestamp,open,high,low,close,volume").unwrap();
    for b in bars {
        writeln!(
            file,
            "{},{},{},{},{},{}",
            b.timestamp.to_rfc3339(),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        )
        .unwrap();
    }
}
