//! Engine configuration.
//!
//! Percent thresholds are stored the way users type them (`8.0` = 8%) and
//! converted to fractions once, in `ExitRules::from_config`. A zero threshold
//! disables its rule.

use serde::{Deserialize, Serialize};

use super::error::EngineError;

/// When entries and close-resolved exits are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionTiming {
    /// Fill at the close of the bar that produced the decision.
    #[default]
    SameBarClose,
    /// Fill at the open of the following bar. Stop-type exits stay intrabar.
    NextBarOpen,
}

/// How the equity curve is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquityMode {
    /// Compound net trade returns at the exit bar; flat between trades.
    #[default]
    RealizedOnly,
    /// Compound bar-over-bar price growth while in a position.
    MarkToMarket,
}

impl std::fmt::Display for ExecutionTiming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionTiming::SameBarClose => f.write_str("same_bar_close"),
            ExecutionTiming::NextBarOpen => f.write_str("next_bar_open"),
        }
    }
}

impl std::str::FromStr for ExecutionTiming {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "same_bar_close" | "close" => Ok(ExecutionTiming::SameBarClose),
            "next_bar_open" | "open" => Ok(ExecutionTiming::NextBarOpen),
            other => Err(format!(
                "unknown execution timing '{other}' (expected same_bar_close or next_bar_open)"
            )),
        }
    }
}

impl std::fmt::Display for EquityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EquityMode::RealizedOnly => f.write_str("realized_only"),
            EquityMode::MarkToMarket => f.write_str("mark_to_market"),
        }
    }
}

impl std::str::FromStr for EquityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "realized_only" | "realized" => Ok(EquityMode::RealizedOnly),
            "mark_to_market" | "mtm" => Ok(EquityMode::MarkToMarket),
            other => Err(format!(
                "unknown equity mode '{other}' (expected realized_only or mark_to_market)"
            )),
        }
    }
}

/// Configuration for a single backtest run. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fee per side as a fraction (0.001 = 0.1%).
    pub fee_fraction: f64,
    /// Slippage in basis points, applied against the trader on both legs.
    pub slippage_bps: u32,
    /// Fixed stop-loss below the entry fill, in percent.
    pub stop_loss_pct: f64,
    /// Take-profit above the entry fill, in percent.
    pub take_profit_pct: f64,
    /// Trailing stop below the high-water mark, in percent.
    pub trailing_stop_pct: f64,
    /// Maximum bars in a trade.
    pub time_stop_bars: usize,
    /// Chandelier multiple: trailing level `hwm - atr * mult` when the
    /// signal stage provides ATR.
    pub chandelier_atr_mult: f64,
    pub execution_timing: ExecutionTiming,
    pub equity_mode: EquityMode,
    /// Capital used to size the entry quantity.
    pub capital: f64,
    /// Allow fractional quantities. When false, quantity is floored.
    pub fractional_units: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fee_fraction: 0.0,
            slippage_bps: 0,
            stop_loss_pct: 0.0,
            take_profit_pct: 0.0,
            trailing_stop_pct: 0.0,
            time_stop_bars: 0,
            chandelier_atr_mult: 0.0,
            execution_timing: ExecutionTiming::SameBarClose,
            equity_mode: EquityMode::RealizedOnly,
            capital: 10_000.0,
            fractional_units: false,
        }
    }
}

impl EngineConfig {
    /// Frictionless config with every exit rule disabled.
    pub fn frictionless() -> Self {
        Self::default()
    }

    pub fn with_stop_loss(mut self, pct: f64) -> Self {
        self.stop_loss_pct = pct;
        self
    }

    pub fn with_take_profit(mut self, pct: f64) -> Self {
        self.take_profit_pct = pct;
        self
    }

    pub fn with_trailing_stop(mut self, pct: f64) -> Self {
        self.trailing_stop_pct = pct;
        self
    }

    pub fn with_time_stop(mut self, bars: usize) -> Self {
        self.time_stop_bars = bars;
        self
    }

    pub fn with_costs(mut self, fee_fraction: f64, slippage_bps: u32) -> Self {
        self.fee_fraction = fee_fraction;
        self.slippage_bps = slippage_bps;
        self
    }

    pub fn with_timing(mut self, timing: ExecutionTiming) -> Self {
        self.execution_timing = timing;
        self
    }

    pub fn with_equity_mode(mut self, mode: EquityMode) -> Self {
        self.equity_mode = mode;
        self
    }

    pub fn slippage_fraction(&self) -> f64 {
        f64::from(self.slippage_bps) / 10_000.0
    }

    /// Reject values that would make the run meaningless.
    pub fn validate(&self) -> Result<(), EngineError> {
        let non_negative = [
            ("fee_fraction", self.fee_fraction),
            ("stop_loss_pct", self.stop_loss_pct),
            ("take_profit_pct", self.take_profit_pct),
            ("trailing_stop_pct", self.trailing_stop_pct),
            ("chandelier_atr_mult", self.chandelier_atr_mult),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::InvalidConfig(format!(
                    "{name} must be a finite value >= 0, got {value}"
                )));
            }
        }
        if self.fee_fraction >= 0.5 {
            return Err(EngineError::InvalidConfig(format!(
                "fee_fraction is a per-side fraction, got {}",
                self.fee_fraction
            )));
        }
        for (name, value) in [
            ("stop_loss_pct", self.stop_loss_pct),
            ("trailing_stop_pct", self.trailing_stop_pct),
        ] {
            if value >= 100.0 {
                return Err(EngineError::InvalidConfig(format!(
                    "{name} must be below 100, got {value}"
                )));
            }
        }
        if self.slippage_bps >= 10_000 {
            return Err(EngineError::InvalidConfig(format!(
                "slippage_bps must be below 10000, got {}",
                self.slippage_bps
            )));
        }
        if !self.capital.is_finite() || self.capital <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "capital must be positive, got {}",
                self.capital
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_and_frictionless() {
        let cfg = EngineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.slippage_fraction(), 0.0);
        assert_eq!(cfg.execution_timing, ExecutionTiming::SameBarClose);
        assert_eq!(cfg.equity_mode, EquityMode::RealizedOnly);
    }

    #[test]
    fn negative_threshold_rejected() {
        let cfg = EngineConfig::default().with_stop_loss(-1.0);
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn full_stop_rejected() {
        let cfg = EngineConfig::default().with_trailing_stop(100.0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn nan_fee_rejected() {
        let cfg = EngineConfig::default().with_costs(f64::NAN, 0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn slippage_fraction_from_bps() {
        let cfg = EngineConfig::default().with_costs(0.0, 25);
        assert!((cfg.slippage_fraction() - 0.0025).abs() < 1e-15);
    }

    #[test]
    fn timing_and_mode_parse() {
        assert_eq!(
            "next_bar_open".parse::<ExecutionTiming>().unwrap(),
            ExecutionTiming::NextBarOpen
        );
        assert_eq!(
            "mark_to_market".parse::<EquityMode>().unwrap(),
            EquityMode::MarkToMarket
        );
        assert!("sometime".parse::<ExecutionTiming>().is_err());
    }

    #[test]
    fn missing_toml_fields_take_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"stop_loss_pct": 8.0}"#).unwrap();
        assert_eq!(cfg.stop_loss_pct, 8.0);
        assert_eq!(cfg.capital, 10_000.0);
        assert_eq!(cfg.time_stop_bars, 0);
    }
}
