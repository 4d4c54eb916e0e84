//! Exit resolver.
//!
//! Rules are evaluated in a fixed priority and the first match wins:
//!
//! 1. Trailing stop (percent of high-water mark, or chandelier when ATR is present)
//! 2. Fixed stop-loss
//! 3. Take-profit
//! 4. Time stop
//! 5. Signal exit (SELL flag)
//!
//! Stop-type rules are checked against the bar's low/high and exit at their
//! level, assuming the worst intrabar path reaches a stop before a target.
//! Time and signal exits only resolve at the close.
//!
//! The caller must advance the position with the current bar (high-water mark,
//! bars held) before calling `resolve`.

use serde::{Deserialize, Serialize};

use super::config::EngineConfig;
use crate::domain::{ExitReason, Position, SignalBar};

/// Where in the bar an exit resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitPoint {
    /// At a protective level touched by the bar's range.
    Intrabar,
    /// At the bar's close (or the next open under next-bar timing).
    Close,
}

/// A resolved exit: which rule fired and at what raw price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitDecision {
    pub reason: ExitReason,
    pub trigger_price: f64,
    pub point: ExitPoint,
}

/// Enabled exit rules, thresholds as fractions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ExitRules {
    pub trailing: Option<f64>,
    pub chandelier_mult: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub time_stop: Option<usize>,
}

fn enabled(pct: f64) -> Option<f64> {
    (pct > 0.0).then_some(pct / 100.0)
}

impl ExitRules {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            trailing: enabled(config.trailing_stop_pct),
            chandelier_mult: (config.chandelier_atr_mult > 0.0).then_some(config.chandelier_atr_mult),
            stop_loss: enabled(config.stop_loss_pct),
            take_profit: enabled(config.take_profit_pct),
            time_stop: (config.time_stop_bars > 0).then_some(config.time_stop_bars),
        }
    }

    /// Trailing level for the position, combining the percent and chandelier rules.
    pub fn trailing_level(&self, position: &Position, atr: Option<f64>) -> Option<f64> {
        let pct_level = self
            .trailing
            .map(|trail| position.high_water_mark * (1.0 - trail));
        let chandelier_level = match (self.chandelier_mult, atr) {
            (Some(mult), Some(atr)) if atr.is_finite() => {
                Some(position.high_water_mark - atr * mult)
            }
            _ => None,
        };
        match (pct_level, chandelier_level) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn stop_level(&self, position: &Position) -> Option<f64> {
        self.stop_loss.map(|stop| position.entry_price * (1.0 - stop))
    }

    pub fn target_level(&self, position: &Position) -> Option<f64> {
        self.take_profit.map(|tp| position.entry_price * (1.0 + tp))
    }
}

/// Decide whether `position` exits on `bar`.
pub fn resolve(position: &Position, bar: &SignalBar, rules: &ExitRules) -> Option<ExitDecision> {
    let b = &bar.bar;

    if let Some(level) = rules.trailing_level(position, bar.atr) {
        if b.low <= level {
            return Some(intrabar(ExitReason::Trail, level));
        }
    }

    if let Some(level) = rules.stop_level(position) {
        if b.low <= level {
            return Some(intrabar(ExitReason::Stop, level));
        }
    }

    if let Some(level) = rules.target_level(position) {
        if b.high >= level {
            return Some(intrabar(ExitReason::Tp, level));
        }
    }

    if let Some(max_bars) = rules.time_stop {
        if position.bars_held >= max_bars {
            return Some(at_close(ExitReason::Time, b.close));
        }
    }

    if bar.sell {
        return Some(at_close(ExitReason::Signal, b.close));
    }

    None
}

fn intrabar(reason: ExitReason, level: f64) -> ExitDecision {
    ExitDecision {
        reason,
        trigger_price: level,
        point: ExitPoint::Intrabar,
    }
}

fn at_close(reason: ExitReason, close: f64) -> ExitDecision {
    ExitDecision {
        reason,
        trigger_price: close,
        point: ExitPoint::Close,
    }
}
