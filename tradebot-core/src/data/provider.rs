//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over data sources (Yahoo Finance, Stooq,
//! CSV import, synthetic) so the fallback chain can try them in order and
//! tests can substitute fakes.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Bar;

/// Bar interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Interval {
    #[default]
    #[serde(rename = "1d")]
    Daily,
    #[serde(rename = "1h")]
    Hourly,
    #[serde(rename = "1wk")]
    Weekly,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Daily => "1d",
            Interval::Hourly => "1h",
            Interval::Weekly => "1wk",
        }
    }

    pub fn is_intraday(&self) -> bool {
        matches!(self, Interval::Hourly)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1d" | "d" | "daily" => Ok(Interval::Daily),
            "1h" | "60m" | "h" | "hourly" => Ok(Interval::Hourly),
            "1wk" | "1w" | "w" | "weekly" => Ok(Interval::Weekly),
            other => Err(DataError::UnsupportedInterval(other.to_string())),
        }
    }
}

/// How far back to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchRange {
    /// Everything from this date up to today.
    Since(NaiveDate),
    /// A trailing period such as `6mo`, `1y`, `5y`.
    Period(String),
}

impl FetchRange {
    /// First date covered by the range, relative to `today`.
    pub fn start_date(&self, today: NaiveDate) -> Result<NaiveDate, DataError> {
        match self {
            FetchRange::Since(d) => Ok(*d),
            FetchRange::Period(p) => {
                let months = period_months(p)?;
                today
                    .checked_sub_months(Months::new(months))
                    .ok_or_else(|| DataError::InvalidPeriod(p.clone()))
            }
        }
    }
}

impl fmt::Display for FetchRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchRange::Since(d) => write!(f, "since {d}"),
            FetchRange::Period(p) => write!(f, "period {p}"),
        }
    }
}

/// Parse `Nd`, `Nmo`, `Ny` and `ytd` into whole months (days round up).
pub fn period_months(period: &str) -> Result<u32, DataError> {
    let p = period.trim().to_ascii_lowercase();
    let invalid = || DataError::InvalidPeriod(period.to_string());
    if p == "ytd" {
        return Ok(chrono::Utc::now().date_naive().month());
    }
    let split = p.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
    let (num, unit) = p.split_at(split);
    let n: u32 = num.parse().map_err(|_| invalid())?;
    match unit {
        "mo" => Ok(n),
        "y" => Ok(n * 12),
        "d" => Ok(n.div_ceil(30).max(1)),
        _ => Err(invalid()),
    }
}

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no data returned for {symbol}")]
    Empty { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("{provider} does not serve {interval} bars")]
    UnsupportedIntervalForProvider {
        provider: String,
        interval: Interval,
    },

    #[error("unsupported interval: {0}")]
    UnsupportedInterval(String),

    #[error("invalid period: {0} (expected e.g. 6mo, 1y, 5y)")]
    InvalidPeriod(String),

    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("all sources failed for {symbol}:\n  {}", .attempts.join("\n  "))]
    AllSourcesFailed {
        symbol: String,
        attempts: Vec<String>,
    },

    #[error("data error: {0}")]
    Other(String),
}

/// Result of a successful data fetch for a single symbol.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    pub bars: Vec<Bar>,
    pub source: DataSource,
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    YahooFinance,
    Stooq,
    CsvImport,
    Synthetic,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataSource::YahooFinance => "yahoo",
            DataSource::Stooq => "stooq",
            DataSource::CsvImport => "csv",
            DataSource::Synthetic => "synthetic",
        };
        f.write_str(name)
    }
}

/// Trait for data providers (Yahoo Finance, Stooq, etc).
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch OHLCV bars for a symbol.
    fn fetch(
        &self,
        symbol: &str,
        range: &FetchRange,
        interval: Interval,
    ) -> Result<FetchResult, DataError>;

    /// Whether this provider can serve `interval` at all.
    fn supports(&self, interval: Interval) -> bool;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool {
        true
    }
}
