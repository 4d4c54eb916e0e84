//! Position state machine: `Flat` or `Long`, nothing else.

use chrono::NaiveDateTime;

use super::cost::{CostModel, FillSide};
use crate::domain::{ExitReason, Position, Trade};

#[derive(Debug, Clone, Default, PartialEq)]
pub enum PositionState {
    #[default]
    Flat,
    Long(Position),
}

impl PositionState {
    pub fn is_long(&self) -> bool {
        matches!(self, PositionState::Long(_))
    }

    pub fn position(&self) -> Option<&Position> {
        match self {
            PositionState::Long(p) => Some(p),
            PositionState::Flat => None,
        }
    }

    pub fn position_mut(&mut self) -> Option<&mut Position> {
        match self {
            PositionState::Long(p) => Some(p),
            PositionState::Flat => None,
        }
    }

    /// Flat → Long. Returns false (and stays flat) if already long or the
    /// quantity rounds to nothing.
    pub fn enter(
        &mut self,
        bar_index: usize,
        timestamp: NaiveDateTime,
        trigger_price: f64,
        quantity: f64,
        cost: &CostModel,
    ) -> bool {
        if self.is_long() || quantity <= 0.0 {
            return false;
        }
        let fill = cost.fill(trigger_price, FillSide::Entry);
        *self = PositionState::Long(Position::open(
            bar_index,
            timestamp,
            trigger_price,
            fill,
            quantity,
        ));
        true
    }

    /// Long → Flat, producing the closed trade. `None` when already flat.
    pub fn exit(
        &mut self,
        bar_index: usize,
        timestamp: NaiveDateTime,
        trigger_price: f64,
        reason: ExitReason,
        cost: &CostModel,
    ) -> Option<Trade> {
        let PositionState::Long(position) = std::mem::take(self) else {
            return None;
        };
        let exit_price = cost.fill(trigger_price, FillSide::Exit);
        Some(Trade {
            entry_bar: position.entry_bar_index,
            entry_timestamp: position.entry_timestamp,
            entry_trigger: position.entry_trigger,
            entry_price: position.entry_price,
            exit_bar: bar_index,
            exit_timestamp: timestamp,
            exit_trigger: trigger_price,
            exit_price,
            exit_reason: reason,
            quantity: position.quantity,
            bars_held: bar_index - position.entry_bar_index,
            net_return: cost.net_return(position.entry_price, exit_price),
        })
    }
}

/// Units purchasable with `capital` at `fill_price`.
pub fn entry_quantity(capital: f64, fill_price: f64, fractional: bool) -> f64 {
    if fill_price <= 0.0 || !fill_price.is_finite() {
        return 0.0;
    }
    let qty = capital / fill_price;
    if fractional {
        qty
    } else {
        qty.floor()
    }
}
