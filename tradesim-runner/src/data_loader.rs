//! CSV bar loading — batch (`load_bars_csv`) and lazy streaming
//! (`CsvBarSource`).
//!
//! Expected columns: `timestamp,open,high,low,close,volume`. Timestamps may
//! be epoch milliseconds, RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or a bare
//! date. Rows are parsed, not validated: the engine rejects malformed or
//! out-of-order bars itself, with the bar's index.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use tradesim_core::{Bar, BarSource, SourceError};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("row {row}: {source}")]
    Csv {
        row: usize,
        #[source]
        source: csv::Error,
    },
    #[error("row {row}: unrecognised timestamp '{value}'")]
    Timestamp { row: usize, value: String },
    #[error("{path} contains no bars")]
    Empty { path: PathBuf },
}

impl From<LoadError> for SourceError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Io { source, .. } => SourceError::Io(source),
            LoadError::Csv { row, source } => SourceError::Parse {
                row,
                message: source.to_string(),
            },
            LoadError::Timestamp { row, value } => SourceError::Parse {
                row,
                message: format!("unrecognised timestamp '{value}'"),
            },
            LoadError::Empty { path } => SourceError::Parse {
                row: 0,
                message: format!("{} contains no bars", path.display()),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "time", alias = "date", alias = "open_time")]
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Parse a timestamp cell.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ms) = value.parse::<i64>() {
        return Utc.timestamp_millis_opt(ms).single();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Forward-only bar source over CSV rows. Reads one row per `next_bar`.
pub struct CsvBarSource<R: Read> {
    rows: csv::DeserializeRecordsIntoIter<R, CsvRow>,
    /// 1-based data row of the next record (header excluded).
    row: usize,
}

impl CsvBarSource<File> {
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        let file = File::open(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(file))
    }
}

impl<R: Read> CsvBarSource<R> {
    pub fn from_reader(reader: R) -> Self {
        let rows = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader)
            .into_deserialize();
        Self { rows, row: 1 }
    }

    pub fn next_row(&mut self) -> Result<Option<Bar>, LoadError> {
        let Some(record) = self.rows.next() else {
            return Ok(None);
        };
        let row = self.row;
        self.row += 1;
        let record: CsvRow = record.map_err(|source| LoadError::Csv { row, source })?;
        let timestamp =
            parse_timestamp(&record.timestamp).ok_or_else(|| LoadError::Timestamp {
                row,
                value: record.timestamp.clone(),
            })?;
        Ok(Some(Bar::new(
            timestamp,
            record.open,
            record.high,
            record.low,
            record.close,
            record.volume,
        )))
    }
}

impl<R: Read> BarSource for CsvBarSource<R> {
    fn next_bar(&mut self) -> Result<Option<Bar>, SourceError> {
        Ok(self.next_row()?)
    }
}

/// Load every bar of a CSV file into memory.
pub fn load_bars_csv(path: &Path) -> Result<Vec<Bar>, LoadError> {
    let mut source = CsvBarSource::open(path)?;
    let mut bars = Vec::new();
    while let Some(bar) = source.next_row()? {
        bars.push(bar);
    }
    if bars.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }
    debug!(path = %path.display(), bars = bars.len(), "loaded bars");
    Ok(bars)
}

/// Bars with `start <= timestamp < end`.
pub fn slice_by_time(bars: &[Bar], start: DateTime<Utc>, end: DateTime<Utc>) -> &[Bar] {
    let lo = bars.partition_point(|b| b.timestamp < start);
    let hi = bars.partition_point(|b| b.timestamp < end);
    &bars[lo..hi.max(lo)]
}
