//! Average True Range — simple rolling mean of true range.
//!
//! The first bar's true range is high − low (no previous close).

use super::sma::Sma;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    ranges: Sma,
    prev_close: Option<f64>,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self {
            ranges: Sma::new(period),
            prev_close: None,
        }
    }

    pub fn update(&mut self, bar: &Bar) -> Option<f64> {
        let tr = bar.true_range(self.prev_close);
        self.prev_close = Some(bar.close);
        self.ranges.update(tr)
    }

    pub fn value(&self) -> Option<f64> {
        self.ranges.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn averages_true_range_including_gaps() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut atr = Atr::new(2);
        // TR = 2 (high − low)
        assert_eq!(atr.update(&Bar::new(t0, 10.0, 11.0, 9.0, 10.0, 1.0)), None);
        // gap up: TR = max(1, |13 − 10|, |12 − 10|) = 3
        let second = Bar::new(t0 + Duration::hours(1), 12.5, 13.0, 12.0, 12.5, 1.0);
        assert_eq!(atr.update(&second), Some(2.5));
        assert_eq!(atr.value(), Some(2.5));
    }
}
