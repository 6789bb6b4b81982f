//! Per-bar feature snapshot consumed by the pullback rules and the
//! trade-quality model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Atr, Ema, Rsi, Sma};
use crate::domain::Bar;

/// Indicator values as of one bar's close. Warm-up fields are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub volume: f64,
    pub ema_20: f64,
    pub ema_50: f64,
    pub sma_20: Option<f64>,
    pub rsi_14: Option<f64>,
    pub atr_14: Option<f64>,
    pub volume_ma_20: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub log_return: Option<f64>,
}

impl FeatureRow {
    /// True once every windowed indicator has warmed up.
    pub fn is_complete(&self) -> bool {
        self.sma_20.is_some()
            && self.rsi_14.is_some()
            && self.atr_14.is_some()
            && self.volume_ratio.is_some()
    }
}

/// Rolling state behind [`FeatureRow`].
#[derive(Debug, Clone)]
pub struct FeatureEngine {
    ema_20: Ema,
    ema_50: Ema,
    sma_20: Sma,
    rsi_14: Rsi,
    atr_14: Atr,
    volume_ma_20: Sma,
    prev_close: Option<f64>,
    latest: Option<FeatureRow>,
}

impl Default for FeatureEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureEngine {
    pub fn new() -> Self {
        Self {
            ema_20: Ema::new(20),
            ema_50: Ema::new(50),
            sma_20: Sma::new(20),
            rsi_14: Rsi::new(14),
            atr_14: Atr::new(14),
            volume_ma_20: Sma::new(20),
            prev_close: None,
            latest: None,
        }
    }

    pub fn update(&mut self, bar: &Bar) -> FeatureRow {
        let volume_ma_20 = self.volume_ma_20.update(bar.volume);
        let row = FeatureRow {
            timestamp: bar.timestamp,
            close: bar.close,
            volume: bar.volume,
            ema_20: self.ema_20.update(bar.close),
            ema_50: self.ema_50.update(bar.close),
            sma_20: self.sma_20.update(bar.close),
            rsi_14: self.rsi_14.update(bar.close),
            atr_14: self.atr_14.update(bar),
            volume_ma_20,
            volume_ratio: volume_ma_20.filter(|ma| *ma > 0.0).map(|ma| bar.volume / ma),
            log_return: self.prev_close.map(|prev| (bar.close / prev).ln()),
        };
        self.prev_close = Some(bar.close);
        self.latest = Some(row);
        row
    }

    /// Row for the most recent bar.
    pub fn latest(&self) -> Option<&FeatureRow> {
        self.latest.as_ref()
    }
}
