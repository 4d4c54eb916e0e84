//! Backtest runner: wires together data loading, signals, and the engine.
//!
//! Two entry points:
//! - `run_single_backtest()`: loads bars (synthetic, CSV or the fallback
//!   chain), then runs. Used by the CLI.
//! - `run_backtest_from_bars()`: takes pre-loaded bars, no I/O. Used by
//!   tests and by callers that already hold data.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tradebot_core::data::{self, synthetic, DataError, DataSource, FallbackChain, FetchResult};
use tradebot_core::domain::{Bar, Trade};
use tradebot_core::engine::{run_backtest, EngineError, Statistics};
use tradebot_core::signals::SignalConfigError;

use crate::config::{BacktestConfig, ConfigError, RunId};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("strategy error: {0}")]
    Strategy(#[from] SignalConfigError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("no bars for '{symbol}' since {start}")]
    NoBars { symbol: String, start: NaiveDate },
    #[error("no data source: configure csv_path, synthetic, or provide a provider chain")]
    NoDataSource,
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub symbol: String,
    /// Signal generator name, e.g. `rsi_threshold`.
    pub strategy: String,
    pub config: BacktestConfig,
    pub start_date: String,
    pub end_date: String,
    pub bar_count: usize,
    /// Bars with a BUY flag.
    pub signal_count: usize,
    pub warmup_bars: usize,
    pub data_source: DataSource,
    pub has_synthetic: bool,
    pub stats: Statistics,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<f64>,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Run a backtest over pre-loaded bars, without I/O.
pub fn run_backtest_from_bars(
    config: &BacktestConfig,
    bars: &[Bar],
    data_source: DataSource,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let symbol = &config.backtest.symbol;
    let (first, last) = match (bars.first(), bars.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return Err(RunError::NoBars {
                symbol: symbol.clone(),
                start: config.backtest.start,
            })
        }
    };

    let generator = config.strategy.build()?;
    let series = generator.generate(bars);
    let outcome = run_backtest(&series, &config.engine)?;

    tracing::info!(
        symbol = %symbol,
        strategy = generator.name(),
        bars = bars.len(),
        trades = outcome.trades.len(),
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id: config.run_id()?,
        symbol: symbol.clone(),
        strategy: generator.name().to_string(),
        config: config.clone(),
        start_date: first.timestamp.to_string(),
        end_date: last.timestamp.to_string(),
        bar_count: bars.len(),
        signal_count: series.buy_count(),
        warmup_bars: generator.warmup_bars(),
        data_source,
        has_synthetic: data_source == DataSource::Synthetic,
        stats: outcome.stats,
        trades: outcome.trades,
        equity_curve: outcome.equity_curve,
    })
}

/// Load the bars a config asks for.
///
/// Priority: synthetic, then `csv_path`, then the provider chain.
pub fn load_bars(
    config: &BacktestConfig,
    chain: Option<&FallbackChain>,
) -> Result<FetchResult, RunError> {
    let section = &config.backtest;
    let symbol = section.symbol.clone();

    let result = if section.synthetic {
        let today = chrono::Local::now().date_naive();
        tracing::warn!(symbol = %symbol, "using synthetic bars");
        FetchResult {
            bars: synthetic::generate(&symbol, section.start, today),
            symbol,
            source: DataSource::Synthetic,
        }
    } else if let Some(path) = &section.csv_path {
        let bars = data::load_csv(path)?
            .into_iter()
            .filter(|b| b.timestamp.date() >= section.start)
            .collect();
        FetchResult {
            symbol,
            bars,
            source: DataSource::CsvImport,
        }
    } else {
        let chain = chain.ok_or(RunError::NoDataSource)?;
        chain.fetch(&symbol, section.start, section.interval, section.source)?
    };

    if result.bars.is_empty() {
        return Err(RunError::NoBars {
            symbol: result.symbol,
            start: section.start,
        });
    }
    Ok(result)
}

/// Load data for `config` and run it.
pub fn run_single_backtest(
    config: &BacktestConfig,
    chain: Option<&FallbackChain>,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let loaded = load_bars(config, chain)?;
    tracing::info!(
        symbol = %loaded.symbol,
        source = %loaded.source,
        bars = loaded.bars.len(),
        "loaded bars"
    );
    run_backtest_from_bars(config, &loaded.bars, loaded.source)
}
