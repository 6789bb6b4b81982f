//! Relative Strength Index from simple rolling means of gains and losses.
//!
//! Needs `period` price changes, i.e. `period + 1` closes. A window with no
//! losses reads 100; a flat window (no gains, no losses) is undefined.

use super::sma::Sma;

#[derive(Debug, Clone)]
pub struct Rsi {
    gains: Sma,
    losses: Sma,
    prev: Option<f64>,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            gains: Sma::new(period),
            losses: Sma::new(period),
            prev: None,
        }
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        let prev = self.prev.replace(close)?;
        let delta = close - prev;
        let avg_gain = self.gains.update(delta.max(0.0));
        let avg_loss = self.losses.update((-delta).max(0.0));
        rsi_from(avg_gain?, avg_loss?)
    }
}

fn rsi_from(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if avg_loss == 0.0 {
        return if avg_gain == 0.0 { None } else { Some(100.0) };
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_period_plus_one_closes() {
        let mut rsi = Rsi::new(2);
        assert_eq!(rsi.update(10.0), None);
        assert_eq!(rsi.update(11.0), None);
        // gains [1, 0], losses [0, 1] → rs = 1 → 50
        assert_eq!(rsi.update(10.0), Some(50.0));
    }

    #[test]
    fn monotone_rise_reads_100() {
        let mut rsi = Rsi::new(3);
        let mut last = None;
        for c in [1.0, 2.0, 3.0, 4.0, 5.0] {
            last = rsi.update(c);
        }
        assert_eq!(last, Some(100.0));
    }

    #[test]
    fn flat_window_is_undefined() {
        let mut rsi = Rsi::new(2);
        for _ in 0..4 {
            assert_eq!(rsi.update(7.0), None);
        }
    }
}
