//! Streaming indicators — O(1) per bar, identical in batch and replay.
//!
//! Each indicator is fed one value (or bar) at a time in order and returns
//! `None` until it has seen enough history.

pub mod atr;
pub mod ema;
pub mod features;
pub mod rsi;
pub mod sma;

pub use atr::Atr;
pub use ema::Ema;
pub use features::{FeatureEngine, FeatureRow};
pub use rsi::Rsi;
pub use sma::Sma;
