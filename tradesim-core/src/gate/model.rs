//! Trade-quality filter — probability that an entry signal works out.
//!
//! Only inference lives here; weights are trained elsewhere and stored as
//! JSON.

use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};
use std::io::Read;
use thiserror::Error;

use crate::indicators::FeatureRow;

/// Model inputs, in the order the stored weights expect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelFeatures {
    /// Monday = 0.
    pub day_of_week: f64,
    pub hour: f64,
    pub ema_20: f64,
    pub rsi_14: f64,
    pub atr_14: f64,
    pub sma_20: f64,
    pub volume_ratio: f64,
    pub volume_ma_20: f64,
    pub close: f64,
    /// (close − ema_20) / atr_14.
    pub ema_distance: f64,
}

impl ModelFeatures {
    pub const NAMES: [&'static str; 10] = [
        "day_of_week",
        "hour",
        "ema_20",
        "rsi_14",
        "atr_14",
        "sma_20",
        "volume_ratio",
        "volume_ma_20",
        "close",
        "ema_distance",
    ];

    /// `None` until all inputs have warmed up, or when ATR is zero.
    pub fn from_row(row: &FeatureRow) -> Option<Self> {
        let atr_14 = row.atr_14.filter(|a| *a > 0.0)?;
        Some(Self {
            day_of_week: f64::from(row.timestamp.weekday().num_days_from_monday()),
            hour: f64::from(row.timestamp.hour()),
            ema_20: row.ema_20,
            rsi_14: row.rsi_14?,
            atr_14,
            sma_20: row.sma_20?,
            volume_ratio: row.volume_ratio?,
            volume_ma_20: row.volume_ma_20?,
            close: row.close,
            ema_distance: (row.close - row.ema_20) / atr_14,
        })
    }

    pub fn to_array(&self) -> [f64; 10] {
        [
            self.day_of_week,
            self.hour,
            self.ema_20,
            self.rsi_14,
            self.atr_14,
            self.sma_20,
            self.volume_ratio,
            self.volume_ma_20,
            self.close,
            self.ema_distance,
        ]
    }
}

pub trait TradeQualityModel: Send + Sync {
    /// Probability of success in [0, 1].
    fn probability(&self, features: &ModelFeatures) -> f64;
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{field} has {got} entries, expected {expected}")]
    Shape {
        field: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("model parameter {0} is not finite")]
    NonFinite(&'static str),
}

/// Logistic regression over standardized features:
/// p = σ(bias + Σ wᵢ · (xᵢ − meanᵢ) / scaleᵢ).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub weights: Vec<f64>,
    pub bias: f64,
    #[serde(default)]
    pub means: Option<Vec<f64>>,
    #[serde(default)]
    pub scales: Option<Vec<f64>>,
}

impl LogisticModel {
    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        let model: Self = serde_json::from_str(json)?;
        model.check()?;
        Ok(model)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ModelError> {
        let model: Self = serde_json::from_reader(reader)?;
        model.check()?;
        Ok(model)
    }

    fn check(&self) -> Result<(), ModelError> {
        let expected = ModelFeatures::NAMES.len();
        let vectors = [
            ("weights", Some(&self.weights)),
            ("means", self.means.as_ref()),
            ("scales", self.scales.as_ref()),
        ];
        for (field, v) in vectors {
            let Some(v) = v else { continue };
            if v.len() != expected {
                return Err(ModelError::Shape {
                    field,
                    expected,
                    got: v.len(),
                });
            }
            if v.iter().any(|x| !x.is_finite()) {
                return Err(ModelError::NonFinite(field));
            }
        }
        if !self.bias.is_finite() {
            return Err(ModelError::NonFinite("bias"));
        }
        if let Some(scales) = &self.scales {
            if scales.iter().any(|s| *s == 0.0) {
                return Err(ModelError::NonFinite("scales"));
            }
        }
        Ok(())
    }
}

impl TradeQualityModel for LogisticModel {
    fn probability(&self, features: &ModelFeatures) -> f64 {
        let x = features.to_array();
        let z = x.iter().enumerate().fold(self.bias, |acc, (i, xi)| {
            let mean = self.means.as_ref().map_or(0.0, |m| m[i]);
            let scale = self.scales.as_ref().map_or(1.0, |s| s[i]);
            acc + self.weights[i] * (xi - mean) / scale
        });
        1.0 / (1.0 + (-z).exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn row() -> FeatureRow {
        FeatureRow {
            // a Wednesday
            timestamp: Utc.with_ymd_and_hms(2024, 3, 6, 14, 0, 0).unwrap(),
            close: 102.0,
            volume: 10.0,
            ema_20: 100.0,
            ema_50: 98.0,
            sma_20: Some(99.5),
            rsi_14: Some(45.0),
            atr_14: Some(2.0),
            volume_ma_20: Some(8.0),
            volume_ratio: Some(1.25),
            log_return: Some(0.001),
        }
    }

    #[test]
    fn features_from_complete_row() {
        let f = ModelFeatures::from_row(&row()).unwrap();
        assert_eq!(f.day_of_week, 2.0);
        assert_eq!(f.hour, 14.0);
        assert_eq!(f.ema_distance, 1.0);
    }

    #[test]
    fn warm_up_row_has_no_features() {
        let mut r = row();
        r.rsi_14 = None;
        assert!(ModelFeatures::from_row(&r).is_none());
        let mut r = row();
        r.atr_14 = Some(0.0);
        assert!(ModelFeatures::from_row(&r).is_none());
    }

    #[test]
    fn zero_weights_give_sigmoid_of_bias() {
        let model = LogisticModel {
            weights: vec![0.0; 10],
            bias: 0.0,
            means: None,
            scales: None,
        };
        let f = ModelFeatures::from_row(&row()).unwrap();
        assert!((model.probability(&f) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn rejects_wrong_shape() {
        let err = LogisticModel::from_json_str(r#"{"weights":[1.0,2.0],"bias":0.0}"#).unwrap_err();
        assert!(matches!(err, ModelError::Shape { got: 2, .. }));
    }

    #[test]
    fn loads_json_with_standardization() {
        let json = r#"{
            "weights": [0,0,0,0,0,0,0,0,0,1.0],
            "bias": 0.0,
            "means": [0,0,0,0,0,0,0,0,0,1.0],
            "scales": [1,1,1,1,1,1,1,1,1,1]
        }"#;
        let model = LogisticModel::from_json_str(json).unwrap();
        let f = ModelFeatures::from_row(&row()).unwrap();
        // ema_distance 1.0 minus mean 1.0 → z = 0
        assert!((model.probability(&f) - 0.5).abs() < 1e-12);
    }
}
