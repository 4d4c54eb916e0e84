//! Moving Average Convergence Divergence (MACD).
//!
//! macd = EMA(fast) - EMA(slow), signal = EMA(macd, signal_period),
//! histogram = macd - signal. All EMAs are seeded with their first value.
//!
//! `Indicator::compute` returns the MACD line; use `compute_lines` for all three.

use super::ema::ema_of_series;
use super::{closes, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone, PartialEq)]
pub struct MacdLines {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl MacdLines {
    pub fn len(&self) -> usize {
        self.macd.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macd.is_empty()
    }

    /// MACD crossed above its signal line at `i` (was at or below at `i-1`).
    pub fn cross_up(&self, i: usize) -> bool {
        i >= 1 && self.macd[i] > self.signal[i] && self.macd[i - 1] <= self.signal[i - 1]
    }

    /// MACD crossed below its signal line at `i` (was at or above at `i-1`).
    pub fn cross_down(&self, i: usize) -> bool {
        i >= 1 && self.macd[i] < self.signal[i] && self.macd[i - 1] >= self.signal[i - 1]
    }
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    name: String,
}

impl Default for Macd {
    fn default() -> Self {
        Self::new(12, 26, 9)
    }
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast >= 1 && slow >= 1 && signal >= 1, "MACD periods must be >= 1");
        Self {
            fast,
            slow,
            signal,
            name: format!("macd_{fast}_{slow}_{signal}"),
        }
    }

    pub fn compute_lines(&self, closes: &[f64]) -> MacdLines {
        let fast = ema_of_series(closes, self.fast);
        let slow = ema_of_series(closes, self.slow);
        let macd: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = ema_of_series(&macd, self.signal);
        let histogram = macd.iter().zip(&signal).map(|(m, s)| m - s).collect();
        MacdLines {
            macd,
            signal,
            histogram,
        }
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        self.compute_lines(&closes(bars)).macd
    }
}
