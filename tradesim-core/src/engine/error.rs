use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::BarError;

use super::source::SourceError;

/// Fatal run errors. Never recovered inside the engine; the run stops and
/// the caller gets enough context to find the offending bar.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("malformed bar #{index} at {timestamp}: {source}")]
    DataIntegrity {
        index: usize,
        timestamp: DateTime<Utc>,
        #[source]
        source: BarError,
    },
    #[error("bar #{index} at {timestamp} does not follow previous bar at {previous}")]
    OutOfOrder {
        index: usize,
        previous: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
    #[error("bar #{index} at {timestamp} is off the {interval_secs}s grid (previous {previous})")]
    IrregularInterval {
        index: usize,
        previous: DateTime<Utc>,
        timestamp: DateTime<Utc>,
        interval_secs: i64,
    },
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),
    #[error("bar source failed after {bars_read} bars: {source}")]
    Source {
        bars_read: usize,
        #[source]
        source: SourceError,
    },
}

impl EngineError {
    /// Index of the offending bar, when the error is about one.
    pub fn bar_index(&self) -> Option<usize> {
        match self {
            EngineError::DataIntegrity { index, .. }
            | EngineError::OutOfOrder { index, .. }
            | EngineError::IrregularInterval { index, .. } => Some(*index),
            EngineError::Source { bars_read, .. } => Some(*bars_read),
            EngineError::Configuration(_) => None,
        }
    }
}
