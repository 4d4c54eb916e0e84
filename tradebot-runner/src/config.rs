//! Serializable backtest configuration.
//!
//! A backtest is described by one TOML file with three sections:
//!
//! ```toml
//! [backtest]
//! symbol = "ERIC-B.ST"
//! start = "2018-01-01"
//! interval = "1d"
//! source = "auto"
//!
//! [strategy]
//! type = "rsi_threshold"
//! rsi_buy = 52.0
//! rsi_sell = 59.0
//!
//! [engine]
//! stop_loss_pct = 8.0
//! slippage_bps = 5
//! ```
//!
//! `[strategy]` and `[engine]` may be omitted; every field has a default.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tradebot_core::data::{Interval, SourcePreference};
use tradebot_core::engine::{EngineConfig, EngineError};
use tradebot_core::signals::{SignalConfigError, StrategyConfig};

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid [backtest] section: {0}")]
    Invalid(String),
    #[error("invalid [strategy] section: {0}")]
    Strategy(#[from] SignalConfigError),
    #[error("invalid [engine] section: {0}")]
    Engine(#[from] EngineError),
}

/// Data selection for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSection {
    pub symbol: String,
    #[serde(default = "default_start")]
    pub start: NaiveDate,
    #[serde(default)]
    pub interval: Interval,
    #[serde(default)]
    pub source: SourcePreference,
    /// Read bars from this CSV instead of downloading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_path: Option<PathBuf>,
    /// Use deterministic synthetic bars (offline runs).
    #[serde(default)]
    pub synthetic: bool,
}

fn default_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2018, 1, 1).unwrap_or_default()
}

impl BacktestSection {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            start: default_start(),
            interval: Interval::default(),
            source: SourcePreference::default(),
            csv_path: None,
            synthetic: false,
        }
    }
}

/// Full configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl BacktestConfig {
    /// Config for `symbol` with default strategy and engine settings.
    pub fn for_symbol(symbol: impl Into<String>) -> Self {
        Self {
            backtest: BacktestSection::new(symbol),
            strategy: StrategyConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backtest.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("symbol must not be empty".into()));
        }
        if self.backtest.synthetic && self.backtest.csv_path.is_some() {
            return Err(ConfigError::Invalid(
                "synthetic and csv_path are mutually exclusive".into(),
            ));
        }
        self.strategy.validate()?;
        self.engine.validate()?;
        Ok(())
    }

    /// Deterministic hash of the configuration.
    ///
    /// Two runs with identical configs share a RunId.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}
