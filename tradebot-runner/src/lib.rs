//! TradeBot Runner: backtest orchestration, sweeps, alerts, and export.
//!
//! This crate builds on `tradebot-core` to provide:
//! - TOML run configuration with content-addressed run IDs
//! - Single-backtest runner over synthetic, CSV or downloaded bars
//! - Parameter sweeps with a filtered leaderboard and train/test split
//! - Watchlist alert passes with persistent state and notifiers
//! - JSON, CSV and Markdown artifacts

pub mod alert;
pub mod config;
pub mod export;
pub mod leaderboard;
pub mod notify;
pub mod optimize;
pub mod runner;

pub use alert::{load_watchlist, run_alert_pass, Alert, AlertError, AlertReport, AlertState};
pub use config::{BacktestConfig, BacktestSection, ConfigError, RunId};
pub use leaderboard::{Leaderboard, LeaderboardRow, SortKey, SweepParams};
pub use notify::{LogNotifier, Notifier, NotifyError, TelegramNotifier};
pub use optimize::{
    parse_float_range, parse_int_range, split_at, Sweep, SweepCriteria, SweepError, SweepGrid,
    SweepSummary, TrainTestReport,
};
pub use runner::{
    load_bars, run_backtest_from_bars, run_single_backtest, BacktestResult, RunError,
    SCHEMA_VERSION,
};
