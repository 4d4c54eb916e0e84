//! Open long position.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A single open long position.
///
/// Owned by the engine loop; created on an entry fill and dropped on exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub entry_bar_index: usize,
    pub entry_timestamp: NaiveDateTime,
    /// Raw price the entry was triggered at (close or next open).
    pub entry_trigger: f64,
    /// Fill price after entry slippage.
    pub entry_price: f64,
    pub quantity: f64,
    /// Highest close seen since entry, seeded with the entry trigger.
    pub high_water_mark: f64,
    /// Bars elapsed since the entry bar.
    pub bars_held: usize,
}

impl Position {
    pub fn open(
        entry_bar_index: usize,
        entry_timestamp: NaiveDateTime,
        entry_trigger: f64,
        entry_price: f64,
        quantity: f64,
    ) -> Self {
        Self {
            entry_bar_index,
            entry_timestamp,
            entry_trigger,
            entry_price,
            quantity,
            high_water_mark: entry_trigger,
            bars_held: 0,
        }
    }

    /// Roll the position forward by one bar: raise the high-water mark to
    /// `close` if higher and count the bar.
    pub fn advance(&mut self, close: f64) {
        if close > self.high_water_mark {
            self.high_water_mark = close;
        }
        self.bars_held += 1;
    }

    pub fn unrealized_return(&self, price: f64) -> f64 {
        price / self.entry_price - 1.0
    }
}
