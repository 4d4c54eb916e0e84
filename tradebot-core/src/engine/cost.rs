//! Fill & cost model.
//!
//! Slippage is baked into the fill price (buyers pay more, sellers get less).
//! Fees are deducted from the trade return, once per leg. Keeping the two
//! separate in this order is what makes frictionless runs reproduce
//! `exit / entry - 1` exactly.

use serde::{Deserialize, Serialize};

use super::config::EngineConfig;

/// Direction of a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillSide {
    Entry,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Slippage in basis points.
    pub slippage_bps: u32,
    /// Fee per side as a fraction.
    pub fee_fraction: f64,
}

impl CostModel {
    pub fn new(slippage_bps: u32, fee_fraction: f64) -> Self {
        Self {
            slippage_bps,
            fee_fraction,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.slippage_bps, config.fee_fraction)
    }

    pub fn frictionless() -> Self {
        Self::new(0, 0.0)
    }

    pub fn slip_fraction(&self) -> f64 {
        f64::from(self.slippage_bps) / 10_000.0
    }

    /// Realized fill price for a raw trigger price.
    pub fn fill(&self, trigger_price: f64, side: FillSide) -> f64 {
        if self.slippage_bps == 0 {
            return trigger_price;
        }
        let slip = self.slip_fraction();
        match side {
            FillSide::Entry => trigger_price * (1.0 + slip),
            FillSide::Exit => trigger_price * (1.0 - slip),
        }
    }

    /// Net trade return: `exit_fill / entry_fill - 1 - 2 * fee`.
    pub fn net_return(&self, entry_fill: f64, exit_fill: f64) -> f64 {
        exit_fill / entry_fill - 1.0 - 2.0 * self.fee_fraction
    }

    /// Multiplicative friction applied to equity per leg in mark-to-market mode.
    pub fn leg_multiplier(&self) -> f64 {
        (1.0 - self.slip_fraction()) * (1.0 - self.fee_fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frictionless_returns_raw_price() {
        let cost = CostModel::frictionless();
        assert_eq!(cost.fill(100.0, FillSide::Entry), 100.0);
        assert_eq!(cost.fill(100.0, FillSide::Exit), 100.0);
        assert_eq!(cost.leg_multiplier(), 1.0);
    }

    #[test]
    fn entry_slippage_increases_price() {
        let cost = CostModel::new(10, 0.0);
        // 100 * (1 + 10/10000) = 100.10
        assert!((cost.fill(100.0, FillSide::Entry) - 100.10).abs() < 1e-10);
    }

    #[test]
    fn exit_slippage_decreases_price() {
        let cost = CostModel::new(10, 0.0);
        assert!((cost.fill(100.0, FillSide::Exit) - 99.90).abs() < 1e-10);
    }

    #[test]
    fn fee_deducted_twice_from_return() {
        let cost = CostModel::new(0, 0.001);
        let r = cost.net_return(100.0, 110.0);
        assert!((r - (0.1 - 0.002)).abs() < 1e-12);
    }

    #[test]
    fn zero_friction_return_is_exact_ratio() {
        let cost = CostModel::frictionless();
        let entry = cost.fill(37.3, FillSide::Entry);
        let exit = cost.fill(41.9, FillSide::Exit);
        assert_eq!(cost.net_return(entry, exit), 41.9 / 37.3 - 1.0);
    }

    #[test]
    fn slippage_and_fee_combine() {
        let cost = CostModel::new(50, 0.0005);
        let entry = cost.fill(100.0, FillSide::Entry); // 100.5
        let exit = cost.fill(110.0, FillSide::Exit); // 109.45
        let expected = 109.45 / 100.5 - 1.0 - 0.001;
        assert!((cost.net_return(entry, exit) - expected).abs() < 1e-12);
    }
}
