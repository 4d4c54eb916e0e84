//! Technical indicators.
//!
//! Indicators are pure functions: bar history in, numeric series out, one
//! value per bar. Warmup positions are `f64::NAN`; signal builders decide how
//! to neutral-fill them.
//!
//! Series helpers (`rolling_mean`, `ema_of_series`) work on plain `&[f64]` so
//! indicators can be chained (MACD signal line, RSI slope filter).

pub mod atr;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use atr::{true_range, Atr};
pub use ema::{ema_of_series, Ema};
pub use macd::{Macd, MacdLines};
pub use rsi::{Rsi, RsiSmoothing};
pub use sma::Sma;

use crate::domain::Bar;

/// Trait for indicators.
///
/// # Look-ahead contamination guard
/// No value at bar t may depend on price data from bar t+1 or later.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_200", "rsi_14").
    fn name(&self) -> &str;

    /// Number of leading bars that are NaN.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    ///
    /// Returns a `Vec<f64>` of the same length as `bars`.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Close prices of `bars`.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Trailing mean over `period` values. NaN until the window is full and
/// whenever the window contains a NaN.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    assert!(period >= 1, "rolling window must be >= 1");
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    let mut sum = 0.0;
    let mut nan_count = 0usize;

    for i in 0..n {
        let entering = values[i];
        if entering.is_nan() {
            nan_count += 1;
        } else {
            sum += entering;
        }
        if i >= period {
            let leaving = values[i - period];
            if leaving.is_nan() {
                nan_count -= 1;
            } else {
                sum -= leaving;
            }
        }
        if i + 1 >= period && nan_count == 0 {
            result[i] = sum / period as f64;
        }
    }
    result
}

/// Trailing maximum over `period` values, current value included. NaN
/// until the window is full and whenever the window contains a NaN.
pub fn rolling_max(values: &[f64], period: usize) -> Vec<f64> {
    assert!(period >= 1, "rolling window must be >= 1");
    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                return f64::NAN;
            }
            let window = &values[i + 1 - period..=i];
            if window.iter().any(|v| v.is_nan()) {
                f64::NAN
            } else {
                window.iter().copied().fold(f64::NEG_INFINITY, f64::max)
            }
        })
        .collect()
}

/// Value `lag` positions earlier; NaN before the series has that much history.
pub fn shift(values: &[f64], lag: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| if i >= lag { values[i - lag] } else { f64::NAN })
        .collect()
}

/// Create synthetic bars from close prices for testing.
///
/// open = previous close (or close for the first bar),
/// high = max(open, close) + 1, low = min(open, close) - 1, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar::new(
                base + chrono::Duration::days(i as i64),
                open,
                open.max(close) + 1.0,
                open.min(close) - 1.0,
                close,
                1000.0,
            )
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
