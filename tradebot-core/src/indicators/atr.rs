//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! ATR is the simple rolling mean of true range over `period` bars.
//! Lookback: period - 1 (the first bar's TR is just high - low).

use super::{rolling_mean, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }

    /// ATR as a percentage of the close, the form volatility filters use.
    pub fn percent_of_close(&self, bars: &[Bar]) -> Vec<f64> {
        self.compute(bars)
            .iter()
            .zip(bars)
            .map(|(atr, bar)| atr / bar.close * 100.0)
            .collect()
    }
}

/// Compute the True Range series from bars.
/// TR[0] = high[0] - low[0] (no previous close).
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let hl = bar.high - bar.low;
            match i.checked_sub(1).map(|p| bars[p].close) {
                Some(pc) => hl.max((bar.high - pc).abs()).max((bar.low - pc).abs()),
                None => hl,
            }
        })
        .collect()
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        rolling_mean(&true_range(bars), self.period)
    }
}
