//! Pull-based bar sources.
//!
//! Batch and streaming callers both hand the driver a [`BarSource`]; the
//! driver pulls one bar at a time. Sources are forward-only; restart by
//! building a new one.

use thiserror::Error;

use crate::domain::Bar;

/// Failure inside a source (I/O, parse). Distinct from a malformed bar,
/// which the driver detects itself.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("row {row}: {message}")]
    Parse { row: usize, message: String },
}

pub trait BarSource {
    /// Next bar, `Ok(None)` once exhausted.
    fn next_bar(&mut self) -> Result<Option<Bar>, SourceError>;

    /// Upper bound on the remaining bars, when cheaply known.
    fn size_hint(&self) -> Option<usize> {
        None
    }
}

impl<S: BarSource + ?Sized> BarSource for &mut S {
    fn next_bar(&mut self) -> Result<Option<Bar>, SourceError> {
        (**self).next_bar()
    }

    fn size_hint(&self) -> Option<usize> {
        (**self).size_hint()
    }
}

impl<S: BarSource + ?Sized> BarSource for Box<S> {
    fn next_bar(&mut self) -> Result<Option<Bar>, SourceError> {
        (**self).next_bar()
    }

    fn size_hint(&self) -> Option<usize> {
        (**self).size_hint()
    }
}

/// In-memory source over owned bars.
#[derive(Debug, Clone)]
pub struct VecSource {
    bars: std::vec::IntoIter<Bar>,
}

impl VecSource {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self {
            bars: bars.into_iter(),
        }
    }
}

impl From<Vec<Bar>> for VecSource {
    fn from(bars: Vec<Bar>) -> Self {
        Self::new(bars)
    }
}

impl BarSource for VecSource {
    fn next_bar(&mut self) -> Result<Option<Bar>, SourceError> {
        Ok(self.bars.next())
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.bars.len())
    }
}

/// Source over a borrowed slice, copying each bar out.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    bars: std::slice::Iter<'a, Bar>,
}

impl<'a> SliceSource<'a> {
    pub fn new(bars: &'a [Bar]) -> Self {
        Self { bars: bars.iter() }
    }
}

impl BarSource for SliceSource<'_> {
    fn next_bar(&mut self) -> Result<Option<Bar>, SourceError> {
        Ok(self.bars.next().copied())
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.bars.len())
    }
}
