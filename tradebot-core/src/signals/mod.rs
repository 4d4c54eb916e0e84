//! Signal builders: bars in, BUY/SELL flags out.
//!
//! Signals depend on price history only. They never see positions or equity;
//! everything stateful happens in the engine. Warmup NaNs are resolved here
//! (RSI neutral-filled, filters false) so the engine only reads flags.

pub mod macd_rsi;
pub mod macd_trend;
pub mod rsi_threshold;

pub use macd_rsi::MacdRsi;
pub use macd_trend::{FilterStrength, MacdTrend};
pub use rsi_threshold::RsiThreshold;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{Bar, SignalSeries};

/// Trait for signal generators.
///
/// # Invariants
/// - `generate()` must be deterministic for the same bars.
/// - The flags at bar t may only depend on `bars[..=t]`.
pub trait SignalGenerator: Send + Sync {
    /// Human-readable name (e.g., "rsi_threshold").
    fn name(&self) -> &str;

    /// Bars needed before every filter can pass.
    fn warmup_bars(&self) -> usize;

    fn generate(&self, bars: &[Bar]) -> SignalSeries;
}

// ─── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SignalConfigError {
    #[error("degenerate config: rsi_buy ({buy}) must be below rsi_sell ({sell})")]
    DegenerateConfig { buy: f64, sell: f64 },
    #[error("invalid signal parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

pub(crate) fn require_period(name: &'static str, value: usize) -> Result<(), SignalConfigError> {
    if value == 0 {
        return Err(SignalConfigError::InvalidParameter {
            name,
            reason: "must be >= 1".into(),
        });
    }
    Ok(())
}

// ─── Strategy config ─────────────────────────────────────────────────

/// Serializable choice of signal builder, tagged by `type`.
///
/// ```toml
/// [strategy]
/// type = "rsi_threshold"
/// rsi_buy = 52.0
/// rsi_sell = 59.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    RsiThreshold(RsiThreshold),
    MacdRsi(MacdRsi),
    MacdTrend(MacdTrend),
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::RsiThreshold(RsiThreshold::default())
    }
}

impl StrategyConfig {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyConfig::RsiThreshold(_) => "rsi_threshold",
            StrategyConfig::MacdRsi(_) => "macd_rsi",
            StrategyConfig::MacdTrend(_) => "macd_trend",
        }
    }

    pub fn validate(&self) -> Result<(), SignalConfigError> {
        match self {
            StrategyConfig::RsiThreshold(s) => s.validate(),
            StrategyConfig::MacdRsi(s) => s.validate(),
            StrategyConfig::MacdTrend(s) => s.validate(),
        }
    }

    /// Validate and build the runtime generator.
    pub fn build(&self) -> Result<Box<dyn SignalGenerator>, SignalConfigError> {
        self.validate()?;
        Ok(match self {
            StrategyConfig::RsiThreshold(s) => Box::new(s.clone()),
            StrategyConfig::MacdRsi(s) => Box::new(s.clone()),
            StrategyConfig::MacdTrend(s) => Box::new(s.clone()),
        })
    }
}

// ─── Snapshot ────────────────────────────────────────────────────────

/// Trade direction a signal points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last-bar view used by alerting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub rsi: f64,
    pub macd: f64,
    pub signal: f64,
    pub buy: bool,
    pub sell: bool,
}

impl Snapshot {
    /// BUY wins when both flags are set.
    pub fn direction(&self) -> Option<Direction> {
        if self.buy {
            Some(Direction::Buy)
        } else if self.sell {
            Some(Direction::Sell)
        } else {
            None
        }
    }
}

/// Snapshot of the last bar under the default `MacdRsi` rules.
///
/// `None` with fewer than two bars, since a crossover needs a previous bar.
pub fn latest_snapshot(bars: &[Bar]) -> Option<Snapshot> {
    MacdRsi::default().snapshot(bars)
}

/// Replace NaN with `fill`.
pub(crate) fn fill_nan(values: &mut [f64], fill: f64) {
    for v in values.iter_mut().filter(|v| v.is_nan()) {
        *v = fill;
    }
}

/// `Some(v)` when finite.
pub(crate) fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}
