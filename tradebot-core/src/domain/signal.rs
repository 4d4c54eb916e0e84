//! Signal series: the engine's only input.
//!
//! A signal stage (see `signals`) turns raw bars into `SignalBar`s by
//! attaching BUY/SELL flags and optional auxiliary levels. Indicator warmup
//! gaps must already be resolved here: the engine never looks at NaN
//! indicators, only at the flags.

use serde::{Deserialize, Serialize};

use super::bar::Bar;

/// One bar plus the decisions the signal stage made for it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalBar {
    pub bar: Bar,
    pub buy: bool,
    pub sell: bool,
    /// Average true range at this bar, when the signal stage computed one.
    pub atr: Option<f64>,
    /// Trend filter state, informational only.
    pub trend_ok: Option<bool>,
}

impl SignalBar {
    /// A bar with no signal and no auxiliary levels.
    pub fn flat(bar: Bar) -> Self {
        Self {
            bar,
            buy: false,
            sell: false,
            atr: None,
            trend_ok: None,
        }
    }

    pub fn with_flags(bar: Bar, buy: bool, sell: bool) -> Self {
        Self {
            buy,
            sell,
            ..Self::flat(bar)
        }
    }
}

/// Ordered per-bar signals for a single instrument.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalSeries {
    /// Name of the generator that produced the flags (e.g. "rsi_threshold").
    pub source: String,
    pub bars: Vec<SignalBar>,
}

impl SignalSeries {
    pub fn new(source: impl Into<String>, bars: Vec<SignalBar>) -> Self {
        Self {
            source: source.into(),
            bars,
        }
    }

    /// Build a series from bars and parallel flag vectors.
    ///
    /// Flags shorter than `bars` are treated as false.
    pub fn from_flags(source: impl Into<String>, bars: &[Bar], buy: &[bool], sell: &[bool]) -> Self {
        let rows = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| {
                SignalBar::with_flags(
                    *bar,
                    buy.get(i).copied().unwrap_or(false),
                    sell.get(i).copied().unwrap_or(false),
                )
            })
            .collect();
        Self::new(source, rows)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn buy_count(&self) -> usize {
        self.bars.iter().filter(|b| b.buy).count()
    }

    pub fn sell_count(&self) -> usize {
        self.bars.iter().filter(|b| b.sell).count()
    }

    /// Last bar of the series, if any.
    pub fn last(&self) -> Option<&SignalBar> {
        self.bars.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(day: u32, close: f64) -> Bar {
        let ts = NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Bar::new(ts, close, close, close, close, 0.0)
    }

    #[test]
    fn from_flags_pads_missing_flags() {
        let bars = vec![bar(2, 10.0), bar(3, 11.0), bar(4, 12.0)];
        let series = SignalSeries::from_flags("test", &bars, &[true], &[false, true]);
        assert_eq!(series.len(), 3);
        assert!(series.bars[0].buy);
        assert!(!series.bars[2].buy);
        assert!(series.bars[1].sell);
        assert!(!series.bars[2].sell);
        assert_eq!(series.buy_count(), 1);
        assert_eq!(series.sell_count(), 1);
    }

    #[test]
    fn flat_bar_has_no_aux() {
        let sb = SignalBar::flat(bar(2, 10.0));
        assert!(!sb.buy && !sb.sell);
        assert!(sb.atr.is_none());
        assert!(sb.trend_ok.is_none());
    }
}
