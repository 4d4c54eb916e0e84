//! Relative Strength Index (RSI).
//!
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//!
//! Two smoothings are supported:
//! - `Wilder`: exponential smoothing with alpha = 1/period, seeded at the
//!   first price change. Valid from index 1.
//! - `Simple`: rolling means of gains and losses. Valid from index `period`.
//!
//! Edge case: avg_loss == 0 gives NaN. Callers neutral-fill (usually with 50).

use serde::{Deserialize, Serialize};

use super::ema::ewm;
use super::{closes, rolling_mean, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsiSmoothing {
    #[default]
    Wilder,
    Simple,
}

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    smoothing: RsiSmoothing,
    name: String,
}

impl Rsi {
    pub fn new(period: usize, smoothing: RsiSmoothing) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        let name = match smoothing {
            RsiSmoothing::Wilder => format!("rsi_{period}"),
            RsiSmoothing::Simple => format!("rsi_sma_{period}"),
        };
        Self {
            period,
            smoothing,
            name,
        }
    }

    pub fn wilder(period: usize) -> Self {
        Self::new(period, RsiSmoothing::Wilder)
    }

    pub fn simple(period: usize) -> Self {
        Self::new(period, RsiSmoothing::Simple)
    }

    /// RSI of an arbitrary price series.
    pub fn compute_series(&self, prices: &[f64]) -> Vec<f64> {
        let n = prices.len();
        let mut gains = vec![f64::NAN; n];
        let mut losses = vec![f64::NAN; n];
        for i in 1..n {
            let change = prices[i] - prices[i - 1];
            if change.is_nan() {
                continue;
            }
            gains[i] = change.max(0.0);
            losses[i] = (-change).max(0.0);
        }

        let (avg_gain, avg_loss) = match self.smoothing {
            RsiSmoothing::Wilder => {
                let alpha = 1.0 / self.period as f64;
                (ewm(&gains, alpha), ewm(&losses, alpha))
            }
            RsiSmoothing::Simple => (
                rolling_mean(&gains, self.period),
                rolling_mean(&losses, self.period),
            ),
        };

        avg_gain
            .iter()
            .zip(&avg_loss)
            .map(|(&g, &l)| rsi_value(g, l))
            .collect()
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain.is_nan() || avg_loss.is_nan() || avg_loss == 0.0 {
        return f64::NAN;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        match self.smoothing {
            RsiSmoothing::Wilder => 1,
            RsiSmoothing::Simple => self.period,
        }
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        self.compute_series(&closes(bars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars};

    #[test]
    fn rsi_all_losses_is_zero() {
        let bars = make_bars(&[105.0, 104.0, 103.0, 102.0, 101.0, 100.0]);
        let result = Rsi::wilder(3).compute(&bars);
        assert!(result[0].is_nan());
        assert_approx(result[3], 0.0, 1e-9);
    }

    #[test]
    fn rsi_all_gains_is_nan() {
        let bars = make_bars(&[100.0, 101.0, 102.0, 103.0]);
        let result = Rsi::wilder(3).compute(&bars);
        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn wilder_seeds_at_first_change() {
        // changes: +2, -1 ; alpha = 1/2
        // gain: 2, then 0.5*0 + 0.5*2 = 1 ; loss: 0, then 0.5*1 + 0.5*0 = 0.5
        let result = Rsi::wilder(2).compute_series(&[10.0, 12.0, 11.0]);
        assert!(result[1].is_nan()); // loss still zero
        assert_approx(result[2], 100.0 - 100.0 / 3.0, 1e-9);
    }

    #[test]
    fn simple_rsi_uses_rolling_windows() {
        // changes: +1, -1, +2, -2 with period 2
        let result = Rsi::simple(2).compute_series(&[10.0, 11.0, 10.0, 12.0, 10.0]);
        assert!(result[1].is_nan());
        // window {+1, -1}: gain 0.5, loss 0.5 → 50
        assert_approx(result[2], 50.0, 1e-9);
        // window {-1, +2}: gain 1.0, loss 0.5 → 66.67
        assert_approx(result[3], 100.0 - 100.0 / 3.0, 1e-9);
    }

    #[test]
    fn rsi_bounds() {
        let bars = make_bars(&[100.0, 105.0, 98.0, 110.0, 95.0, 115.0, 90.0, 120.0]);
        for smoothing in [RsiSmoothing::Wilder, RsiSmoothing::Simple] {
            for (i, &v) in Rsi::new(3, smoothing).compute(&bars).iter().enumerate() {
                if !v.is_nan() {
                    assert!((0.0..=100.0).contains(&v), "RSI out of bounds at bar {i}: {v}");
                }
            }
        }
    }

    #[test]
    fn rsi_names() {
        assert_eq!(Rsi::wilder(14).name(), "rsi_14");
        assert_eq!(Rsi::simple(14).name(), "rsi_sma_14");
    }
}
