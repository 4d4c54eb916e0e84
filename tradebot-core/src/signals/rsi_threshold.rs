//! RSI threshold strategy.
//!
//! BUY when RSI dips below `rsi_buy` and the optional filters pass.
//! SELL when RSI rises above `rsi_sell`.
//!
//! Filters:
//! - trend: close above its 200-bar SMA (false during SMA warmup)
//! - volatility: ATR(14) as a percent of close inside `[atr_lo, atr_hi]`
//!
//! RSI warmup and zero-loss windows are neutral-filled with 50.

use serde::{Deserialize, Serialize};

use super::{fill_nan, finite, require_period, SignalConfigError, SignalGenerator};
use crate::domain::{Bar, SignalBar, SignalSeries};
use crate::indicators::{Atr, Indicator, Rsi, Sma};

pub const TREND_SMA_PERIOD: usize = 200;
pub const ATR_PERIOD: usize = 14;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsiThreshold {
    pub rsi_buy: f64,
    pub rsi_sell: f64,
    pub rsi_len: usize,
    pub use_trend: bool,
    pub use_atr: bool,
    pub atr_lo: f64,
    pub atr_hi: f64,
}

impl Default for RsiThreshold {
    fn default() -> Self {
        Self {
            rsi_buy: 52.0,
            rsi_sell: 59.0,
            rsi_len: 14,
            use_trend: true,
            use_atr: false,
            atr_lo: 0.5,
            atr_hi: 4.0,
        }
    }
}

impl RsiThreshold {
    pub fn with_thresholds(mut self, rsi_buy: f64, rsi_sell: f64) -> Self {
        self.rsi_buy = rsi_buy;
        self.rsi_sell = rsi_sell;
        self
    }

    pub fn validate(&self) -> Result<(), SignalConfigError> {
        require_period("rsi_len", self.rsi_len)?;
        if self.rsi_buy >= self.rsi_sell {
            return Err(SignalConfigError::DegenerateConfig {
                buy: self.rsi_buy,
                sell: self.rsi_sell,
            });
        }
        if self.use_atr && self.atr_lo > self.atr_hi {
            return Err(SignalConfigError::InvalidParameter {
                name: "atr_lo",
                reason: format!("{} exceeds atr_hi {}", self.atr_lo, self.atr_hi),
            });
        }
        Ok(())
    }
}

impl SignalGenerator for RsiThreshold {
    fn name(&self) -> &str {
        "rsi_threshold"
    }

    fn warmup_bars(&self) -> usize {
        let mut warmup = 1;
        if self.use_trend {
            warmup = warmup.max(TREND_SMA_PERIOD);
        }
        if self.use_atr {
            warmup = warmup.max(ATR_PERIOD);
        }
        warmup
    }

    fn generate(&self, bars: &[Bar]) -> SignalSeries {
        let mut rsi = Rsi::wilder(self.rsi_len).compute(bars);
        fill_nan(&mut rsi, 50.0);
        let sma = Sma::new(TREND_SMA_PERIOD).compute(bars);
        let atr = Atr::new(ATR_PERIOD).compute(bars);

        let rows = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| {
                let trend_ok = bar.close > sma[i];
                let atr_pct = atr[i] / bar.close * 100.0;
                let atr_ok = !self.use_atr || (atr_pct >= self.atr_lo && atr_pct <= self.atr_hi);
                let buy = rsi[i] < self.rsi_buy && (!self.use_trend || trend_ok) && atr_ok;
                SignalBar {
                    bar: *bar,
                    buy,
                    sell: rsi[i] > self.rsi_sell,
                    atr: finite(atr[i]),
                    trend_ok: Some(trend_ok),
                }
            })
            .collect();
        SignalSeries::new(self.name(), rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    fn no_filters() -> RsiThreshold {
        RsiThreshold {
            use_trend: false,
            ..RsiThreshold::default()
        }
    }

    #[test]
    fn falling_prices_trigger_buy_without_trend_filter() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        let series = no_filters().generate(&make_bars(&closes));
        assert_eq!(series.len(), 30);
        // First bar has no change: RSI filled with 50, below 52
        assert!(series.bars[0].buy);
        assert!(series.bars[29].buy);
        assert!(!series.bars[29].sell);
    }

    #[test]
    fn alternating_rise_sells() {
        // +5, +2, -1 repeating: RSI settles near 87
        let closes: Vec<f64> = (0..40)
            .map(|i| 100.0 + i as f64 * 2.0 - if i % 3 == 0 { 3.0 } else { 0.0 })
            .collect();
        let series = no_filters().generate(&make_bars(&closes));
        assert!(series.bars[39].sell);
        assert!(!series.bars[39].buy);
    }

    #[test]
    fn trend_filter_blocks_buys_during_warmup() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 - i as f64 * 0.5).collect();
        let series = RsiThreshold::default().generate(&make_bars(&closes));
        assert_eq!(series.buy_count(), 0);
        assert!(series.bars.iter().all(|b| b.trend_ok == Some(false)));
    }

    #[test]
    fn atr_filter_blocks_out_of_band_volatility() {
        // make_bars gives a true range of 2.2 here, roughly 2.3% of price
        let closes: Vec<f64> = (0..40).map(|i| 100.0 - i as f64 * 0.2).collect();
        let bars = make_bars(&closes);
        let narrow = RsiThreshold {
            use_atr: true,
            atr_lo: 0.1,
            atr_hi: 0.5,
            ..no_filters()
        };
        assert_eq!(narrow.generate(&bars).buy_count(), 0);

        let wide = RsiThreshold {
            use_atr: true,
            atr_lo: 0.5,
            atr_hi: 10.0,
            ..no_filters()
        };
        let series = wide.generate(&bars);
        // ATR warmup keeps the first 13 bars flat
        assert!(!series.bars[12].buy);
        assert!(series.bars[39].buy);
    }

    #[test]
    fn attaches_atr_after_warmup() {
        let bars = make_bars(&[10.0; 20]);
        let series = no_filters().generate(&bars);
        assert_eq!(series.bars[12].atr, None);
        assert_eq!(series.bars[13].atr, Some(2.0));
    }

    #[test]
    fn validate_rejects_equal_thresholds() {
        let cfg = RsiThreshold::default().with_thresholds(55.0, 55.0);
        assert!(cfg.validate().is_err());
    }
}
