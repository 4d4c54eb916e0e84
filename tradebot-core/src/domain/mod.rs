//! Domain types for the single-instrument backtest engine.

pub mod bar;
pub mod position;
pub mod signal;
pub mod trade;

pub use bar::{Bar, PriceField};
pub use position::Position;
pub use signal::{SignalBar, SignalSeries};
pub use trade::{ExitReason, Trade};
