//! TradeBot Core: bars, indicators, signals, the backtest engine and data sources.
//!
//! This crate contains the heart of the backtester:
//! - Domain types (bars, signal series, positions, trades)
//! - Indicators (SMA, EMA, Wilder/simple RSI, ATR, MACD)
//! - Signal builders that turn bars into BUY/SELL flags
//! - Bar-by-bar engine with exit resolution, fills and equity accounting
//! - Data providers (Yahoo, Stooq, CSV) behind a fallback chain

pub mod data;
pub mod domain;
pub mod engine;
pub mod indicators;
pub mod signals;
