//! MACD trend-following strategy with trend and momentum gates.
//!
//! BUY on a MACD cross up when both gates pass; SELL on a MACD cross down.
//!
//! | gate      | `Strict`                                             | `Relaxed`            |
//! |-----------|------------------------------------------------------|----------------------|
//! | trend     | close > SMA200, SMA50 > SMA200, SMA200 above 5 bars ago | close > SMA200    |
//! | momentum  | RSI > threshold, RSI > its `rsi_slope`-bar mean, histogram > 0 this bar and last | RSI > threshold, histogram > 0 |
//!
//! With `use_breakout`, a BUY also needs the close to be the highest close of
//! the last `breakout_len` bars.
//!
//! Every bar carries ATR(14) so the engine's chandelier rule can use it.

use serde::{Deserialize, Serialize};

use super::{finite, require_period, SignalConfigError, SignalGenerator};
use crate::domain::{Bar, SignalBar, SignalSeries};
use crate::indicators::{closes, rolling_max, rolling_mean, shift, Atr, Indicator, Macd, Rsi, Sma};

const SMA_FAST: usize = 50;
const SMA_SLOW: usize = 200;
const SMA_RISING_LAG: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStrength {
    #[default]
    Strict,
    Relaxed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacdTrend {
    pub strength: FilterStrength,
    pub rsi_threshold: f64,
    pub rsi_slope: usize,
    pub atr_len: usize,
    pub use_breakout: bool,
    pub breakout_len: usize,
}

impl Default for MacdTrend {
    fn default() -> Self {
        Self::strict()
    }
}

impl MacdTrend {
    pub fn strict() -> Self {
        Self {
            strength: FilterStrength::Strict,
            rsi_threshold: 55.0,
            rsi_slope: 5,
            atr_len: 14,
            use_breakout: false,
            breakout_len: 20,
        }
    }

    pub fn relaxed() -> Self {
        Self {
            strength: FilterStrength::Relaxed,
            rsi_threshold: 52.0,
            ..Self::strict()
        }
    }

    pub fn validate(&self) -> Result<(), SignalConfigError> {
        require_period("rsi_slope", self.rsi_slope)?;
        require_period("atr_len", self.atr_len)?;
        require_period("breakout_len", self.breakout_len)
    }
}

impl SignalGenerator for MacdTrend {
    fn name(&self) -> &str {
        match self.strength {
            FilterStrength::Strict => "macd_trend_strict",
            FilterStrength::Relaxed => "macd_trend_relaxed",
        }
    }

    fn warmup_bars(&self) -> usize {
        match self.strength {
            FilterStrength::Strict => SMA_SLOW + SMA_RISING_LAG,
            FilterStrength::Relaxed => SMA_SLOW,
        }
    }

    fn generate(&self, bars: &[Bar]) -> SignalSeries {
        let prices = closes(bars);
        let lines = Macd::default().compute_lines(&prices);
        let rsi = Rsi::wilder(14).compute_series(&prices);
        let sma_slow = Sma::new(SMA_SLOW).compute(bars);
        let atr = Atr::new(self.atr_len).compute(bars);

        // Strict-only inputs
        let sma_fast = Sma::new(SMA_FAST).compute(bars);
        let sma_slow_lagged = shift(&sma_slow, SMA_RISING_LAG);
        let rsi_mean = rolling_mean(&rsi, self.rsi_slope);
        let hist_prev = shift(&lines.histogram, 1);
        let high_close = self
            .use_breakout
            .then(|| rolling_max(&prices, self.breakout_len));

        let rows = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| {
                let hist = lines.histogram[i];
                let (trend_ok, momentum_ok) = match self.strength {
                    FilterStrength::Strict => (
                        prices[i] > sma_slow[i]
                            && sma_fast[i] > sma_slow[i]
                            && sma_slow[i] > sma_slow_lagged[i],
                        rsi[i] > self.rsi_threshold
                            && rsi[i] > rsi_mean[i]
                            && hist > 0.0
                            && hist_prev[i] > 0.0,
                    ),
                    FilterStrength::Relaxed => (
                        prices[i] > sma_slow[i],
                        rsi[i] > self.rsi_threshold && hist > 0.0,
                    ),
                };
                let breakout_ok = high_close.as_ref().map_or(true, |hi| prices[i] >= hi[i]);
                SignalBar {
                    bar: *bar,
                    buy: lines.cross_up(i) && trend_ok && momentum_ok && breakout_ok,
                    sell: lines.cross_down(i),
                    atr: finite(atr[i]),
                    trend_ok: Some(trend_ok),
                }
            })
            .collect();
        SignalSeries::new(self.name(), rows)
    }
}
