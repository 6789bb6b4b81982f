//! Exponential moving average.
//!
//! EMA[t] = alpha × x[t] + (1 − alpha) × EMA[t−1], alpha = 2 / (period + 1),
//! seeded with the first value (no SMA warm-up).

#[derive(Debug, Clone)]
pub struct Ema {
    alpha: f64,
    current: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            alpha: 2.0 / (period.max(1) as f64 + 1.0),
            current: None,
        }
    }

    pub fn update(&mut self, value: f64) -> f64 {
        let next = match self.current {
            Some(prev) => self.alpha * value + (1.0 - self.alpha) * prev,
            None => value,
        };
        self.current = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.current
    }
}
