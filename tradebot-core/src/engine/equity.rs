//! Equity curve accounting for both equity modes.
//!
//! The curve starts at 1.0 and receives one point per bar, so its length is
//! always `bars + 1`.
//!
//! - `RealizedOnly`: equity moves only at exit bars, by `1 + net_return`.
//! - `MarkToMarket`: while long, equity follows the marked price bar over
//!   bar (entry trigger, then each close, then the exit trigger) and each leg
//!   applies `(1 - slip) * (1 - fee)`. Trade returns are not compounded a
//!   second time at exit.

use super::config::EquityMode;
use super::cost::CostModel;

#[derive(Debug, Clone)]
pub struct EquityTracker {
    mode: EquityMode,
    leg_multiplier: f64,
    equity: f64,
    /// Compounded net trade returns, regardless of mode. Used for sizing.
    realized: f64,
    /// Last marked price of the open position (mark-to-market only).
    mark: Option<f64>,
    curve: Vec<f64>,
}

impl EquityTracker {
    pub fn new(mode: EquityMode, cost: &CostModel, bars: usize) -> Self {
        let mut curve = Vec::with_capacity(bars + 1);
        curve.push(1.0);
        Self {
            mode,
            leg_multiplier: cost.leg_multiplier(),
            equity: 1.0,
            realized: 1.0,
            mark: None,
            curve,
        }
    }

    pub fn equity(&self) -> f64 {
        self.equity
    }

    pub fn realized_equity(&self) -> f64 {
        self.realized
    }

    pub fn on_entry(&mut self, trigger_price: f64) {
        if self.mode == EquityMode::MarkToMarket {
            self.equity *= self.leg_multiplier;
            self.mark = Some(trigger_price);
        }
    }

    pub fn on_exit(&mut self, trigger_price: f64, net_return: f64) {
        self.realized *= 1.0 + net_return;
        match self.mode {
            EquityMode::RealizedOnly => self.equity *= 1.0 + net_return,
            EquityMode::MarkToMarket => {
                if let Some(mark) = self.mark.take() {
                    self.equity *= trigger_price / mark * self.leg_multiplier;
                }
            }
        }
    }

    /// Close out the bar: mark any open position to `close` and record a point.
    pub fn end_bar(&mut self, close: f64) {
        if let Some(mark) = self.mark.as_mut() {
            self.equity *= close / *mark;
            *mark = close;
        }
        self.curve.push(self.equity);
    }

    pub fn into_curve(self) -> Vec<f64> {
        self.curve
    }
}
