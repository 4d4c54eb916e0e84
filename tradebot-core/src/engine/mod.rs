//! Backtesting engine: single instrument, long only, one bar at a time.
//!
//! The engine consumes a validated `SignalSeries` and an `EngineConfig`, then
//! runs the bar loop in `loop_runner`:
//!
//! 1. Start-of-bar: fill orders carried over from the previous bar
//! 2. Exits: trailing, stop, take-profit, time, signal (first match wins)
//! 3. Entries: BUY while flat
//! 4. End-of-bar: EOD liquidation on the last bar, equity accounting
//!
//! The engine is pure. It never reads files or the network and keeps no state
//! between runs, so sweeps can call it from many threads at once.

pub mod config;
pub mod cost;
pub mod equity;
pub mod error;
pub mod exit;
pub mod loop_runner;
pub mod state;
pub mod stats;

pub use config::{EngineConfig, EquityMode, ExecutionTiming};
pub use cost::{CostModel, FillSide};
pub use equity::EquityTracker;
pub use error::EngineError;
pub use exit::{resolve, ExitDecision, ExitPoint, ExitRules};
pub use loop_runner::{run_backtest, validate_series, BacktestOutcome};
pub use state::{entry_quantity, PositionState};
pub use stats::Statistics;
