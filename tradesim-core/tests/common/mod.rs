//! Shared bar and gate builders for integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use tradesim_core::gate::{EntryHint, ScriptedGate};
use tradesim_core::Bar;

pub fn ts(i: usize) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(i as i64)
}

pub fn bar(i: usize, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar::new(ts(i), open, high, low, close, 100.0)
}

/// Random-walk bars from per-bar (return, upper wick, lower wick) triples.
pub fn walk(steps: &[(f64, f64, f64)]) -> Vec<Bar> {
    let mut prev = 100.0_f64;
    steps
        .iter()
        .enumerate()
        .map(|(i, &(ret, up, down))| {
            let open = prev;
            let close = open * (1.0 + ret);
            let high = open.max(close) * (1.0 + up);
            let low = open.min(close) * (1.0 - down);
            prev = close;
            Bar::new(ts(i), open, high, low, close, 100.0)
        })
        .collect()
}

/// Enter wherever `mask` is true, with a fixed volatility hint.
pub fn scripted(bars: &[Bar], mask: &[bool], volatility: f64) -> ScriptedGate {
    ScriptedGate::from_entries(
        bars.iter()
            .zip(mask)
            .filter(|(_, enter)| **enter)
            .map(|(b, _)| {
                (
                    b.timestamp,
                    EntryHint {
                        volatility: Some(volatility),
                        confidence: None,
                    },
                )
            }),
    )
}
