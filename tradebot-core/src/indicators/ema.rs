//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1], alpha = 2/(period+1).
//! Seed: the first finite value (non-adjusted form), so there is no warmup
//! gap beyond leading NaNs in the input.

use super::{closes, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }

    pub fn alpha(&self) -> f64 {
        2.0 / (self.period as f64 + 1.0)
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        ema_of_series(&closes(bars), self.period)
    }
}

/// EMA of an arbitrary series with `alpha = 2/(period+1)`.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    assert!(period >= 1, "EMA period must be >= 1");
    ewm(values, 2.0 / (period as f64 + 1.0))
}

/// Exponentially weighted mean with smoothing factor `alpha`.
///
/// Leading NaNs stay NaN; a NaN after the seed carries the previous value.
pub fn ewm(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut result = vec![f64::NAN; values.len()];
    let mut prev: Option<f64> = None;
    for (i, &x) in values.iter().enumerate() {
        let next = match (prev, x.is_nan()) {
            (None, true) => continue,
            (None, false) => x,
            (Some(p), true) => p,
            (Some(p), false) => alpha * x + (1.0 - alpha) * p,
        };
        result[i] = next;
        prev = Some(next);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn ema_seeds_with_first_close() {
        let bars = make_bars(&[10.0, 12.0, 14.0]);
        let result = Ema::new(3).compute(&bars);
        // alpha = 0.5
        assert_approx(result[0], 10.0, DEFAULT_EPSILON);
        assert_approx(result[1], 11.0, DEFAULT_EPSILON);
        assert_approx(result[2], 12.5, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_constant_series() {
        let result = ema_of_series(&[5.0; 10], 4);
        assert!(result.iter().all(|v| (v - 5.0).abs() < DEFAULT_EPSILON));
    }

    #[test]
    fn ewm_skips_leading_nan() {
        let result = ewm(&[f64::NAN, 2.0, 4.0], 0.5);
        assert!(result[0].is_nan());
        assert_approx(result[1], 2.0, DEFAULT_EPSILON);
        assert_approx(result[2], 3.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_period_1_is_identity() {
        let result = ema_of_series(&[1.0, 7.0, 3.0], 1);
        assert_eq!(result, vec![1.0, 7.0, 3.0]);
    }
}
