//! MACD crossover confirmed by RSI, the alerting strategy.
//!
//! BUY  = MACD crosses above its signal line and RSI > `buy_rsi_above`.
//! SELL = MACD crosses below its signal line, or RSI < `sell_rsi_below`.
//!
//! RSI here is the simple rolling form. During its warmup neither RSI
//! condition can hold, so only crossovers decide.

use serde::{Deserialize, Serialize};

use super::{finite, require_period, SignalConfigError, SignalGenerator, Snapshot};
use crate::domain::{Bar, SignalBar, SignalSeries};
use crate::indicators::{closes, Atr, Indicator, Macd, MacdLines, Rsi};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacdRsi {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
    pub rsi_len: usize,
    pub buy_rsi_above: f64,
    pub sell_rsi_below: f64,
}

impl Default for MacdRsi {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
            rsi_len: 14,
            buy_rsi_above: 50.0,
            sell_rsi_below: 45.0,
        }
    }
}

impl MacdRsi {
    pub fn validate(&self) -> Result<(), SignalConfigError> {
        require_period("fast", self.fast)?;
        require_period("slow", self.slow)?;
        require_period("signal", self.signal)?;
        require_period("rsi_len", self.rsi_len)
    }

    fn lines(&self, bars: &[Bar]) -> (MacdLines, Vec<f64>) {
        let prices = closes(bars);
        let lines = Macd::new(self.fast, self.slow, self.signal).compute_lines(&prices);
        let rsi = Rsi::simple(self.rsi_len).compute_series(&prices);
        (lines, rsi)
    }

    fn flags(&self, lines: &MacdLines, rsi: &[f64], i: usize) -> (bool, bool) {
        let buy = lines.cross_up(i) && rsi[i] > self.buy_rsi_above;
        let sell = lines.cross_down(i) || rsi[i] < self.sell_rsi_below;
        (buy, sell)
    }

    /// Indicator values and flags at the last bar.
    pub fn snapshot(&self, bars: &[Bar]) -> Option<Snapshot> {
        if bars.len() < 2 {
            return None;
        }
        let (lines, rsi) = self.lines(bars);
        let i = bars.len() - 1;
        let (buy, sell) = self.flags(&lines, &rsi, i);
        Some(Snapshot {
            timestamp: bars[i].timestamp,
            price: bars[i].close,
            rsi: rsi[i],
            macd: lines.macd[i],
            signal: lines.signal[i],
            buy,
            sell,
        })
    }
}

impl SignalGenerator for MacdRsi {
    fn name(&self) -> &str {
        "macd_rsi"
    }

    fn warmup_bars(&self) -> usize {
        self.rsi_len
    }

    fn generate(&self, bars: &[Bar]) -> SignalSeries {
        let (lines, rsi) = self.lines(bars);
        let atr = Atr::new(14).compute(bars);
        let rows = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| {
                let (buy, sell) = self.flags(&lines, &rsi, i);
                SignalBar {
                    atr: finite(atr[i]),
                    ..SignalBar::with_flags(*bar, buy, sell)
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

    /// Decline, then a sharp rally: MACD crosses up during the rally.
    fn v_shape() -> Vec<f64> {
        let mut closes: Vec<f64> = (0..40).map(|i| 100.0 - i as f64 * 0.1).collect();
        let bottom = closes[39];
        closes.extend((1..=15).map(|i| bottom + i as f64 * 2.0));
        closes
    }

    #[test]
    fn rally_after_decline_crosses_up_with_strong_rsi() {
        let series = MacdRsi::default().generate(&make_bars(&v_shape()));
        let first_buy = series.bars.iter().position(|b| b.buy);
        assert!(matches!(first_buy, Some(i) if i >= 40));
    }

    #[test]
    fn decline_is_sell_once_rsi_is_valid() {
        let series = MacdRsi::default().generate(&make_bars(&v_shape()));
        // The only crossover in a steady decline is at bar 1; after that the
        // RSI leg decides, and RSI is 0 once its window fills.
        assert!(series.bars[1].sell);
        assert!(!series.bars[5].sell);
        assert!(series.bars[20].sell);
    }

    #[test]
    fn snapshot_requires_two_bars() {
        let bars = make_bars(&[100.0]);
        assert!(MacdRsi::default().snapshot(&bars).is_none());
    }

    #[test]
    fn snapshot_matches_generated_last_bar() {
        let bars = make_bars(&v_shape());
        let strat = MacdRsi::default();
        let snap = strat.snapshot(&bars).unwrap();
        let series = strat.generate(&bars);
        let last = series.last().unwrap();
        assert_eq!(snap.buy, last.buy);
        assert_eq!(snap.sell, last.sell);
        assert_eq!(snap.timestamp, last.bar.timestamp);
        assert_eq!(snap.price, last.bar.close);
    }
}
