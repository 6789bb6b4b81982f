//! Run fingerprints — deterministic identity of a (config, dataset) pair.
//!
//! BLAKE3 over canonical JSON for the config and over the raw field bytes
//! for the bars, so identical inputs name the same artifact directory on
//! every platform.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::EngineConfig;
use crate::domain::Bar;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigHash(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

/// Short, filesystem-safe run identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash of the config's canonical JSON (struct field order is fixed).
pub fn config_hash(config: &EngineConfig) -> Result<ConfigHash, serde_json::Error> {
    let json = serde_json::to_vec(config)?;
    Ok(ConfigHash(blake3::hash(&json).to_hex().to_string()))
}

/// Hash of every bar's timestamp and OHLCV bits, in order.
pub fn dataset_hash(bars: &[Bar]) -> DatasetHash {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(&bar.timestamp.timestamp_millis().to_le_bytes());
        for v in [bar.open, bar.high, bar.low, bar.close, bar.volume] {
            hasher.update(&v.to_bits().to_le_bytes());
        }
    }
    DatasetHash(hasher.finalize().to_hex().to_string())
}

/// `<first 16 hex of blake3(config ‖ dataset ‖ label)>`.
pub fn run_id(config: &ConfigHash, dataset: &DatasetHash, label: &str) -> RunId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(config.0.as_bytes());
    hasher.update(b":");
    hasher.update(dataset.0.as_bytes());
    hasher.update(b":");
    hasher.update(label.as_bytes());
    let hex = hasher.finalize().to_hex();
    RunId(hex.as_str()[..16].to_string())
}
