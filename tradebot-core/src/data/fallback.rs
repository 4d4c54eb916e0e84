//! Source fallback chain.
//!
//! Free data sources fail often and in different ways: Stooq has no intraday
//! data and misses some listings, Yahoo rate-limits and sometimes rejects
//! explicit date ranges while still serving trailing periods. The chain tries
//! a fixed sequence of (provider, range, interval) attempts and returns the
//! first non-empty result.
//!
//! | preference | attempts |
//! |------------|----------|
//! | `stooq`    | Stooq since start |
//! | `yahoo`    | Yahoo since start, then Yahoo periods 5y, 2y, 1y |
//! | `auto`     | (daily) Stooq, then the Yahoo sequence, then (daily) Stooq again |
//!
//! Hourly requests fall back to daily bars for the period attempts.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::canonicalize::canonicalize;
use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, DataProvider, FetchRange, FetchResult, Interval};
use super::stooq::StooqProvider;
use super::yahoo::YahooProvider;

const YAHOO_FALLBACK_PERIODS: [&str; 3] = ["5y", "2y", "1y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourcePreference {
    #[default]
    Auto,
    Yahoo,
    Stooq,
}

impl fmt::Display for SourcePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourcePreference::Auto => "auto",
            SourcePreference::Yahoo => "yahoo",
            SourcePreference::Stooq => "stooq",
        };
        f.write_str(s)
    }
}

impl FromStr for SourcePreference {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(SourcePreference::Auto),
            "yahoo" => Ok(SourcePreference::Yahoo),
            "stooq" => Ok(SourcePreference::Stooq),
            other => Err(DataError::Other(format!(
                "unknown source '{other}' (expected auto, yahoo or stooq)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Stooq,
    Yahoo,
}

/// One planned fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub provider: ProviderKind,
    pub range: FetchRange,
    pub interval: Interval,
}

/// The ordered attempts for a request.
pub fn plan(source: SourcePreference, start: NaiveDate, interval: Interval) -> Vec<Attempt> {
    let since = |provider| Attempt {
        provider,
        range: FetchRange::Since(start),
        interval,
    };
    let yahoo_sequence = || {
        let period_interval = if interval.is_intraday() {
            Interval::Daily
        } else {
            interval
        };
        std::iter::once(since(ProviderKind::Yahoo)).chain(YAHOO_FALLBACK_PERIODS.iter().map(
            move |p| Attempt {
                provider: ProviderKind::Yahoo,
                range: FetchRange::Period((*p).to_string()),
                interval: period_interval,
            },
        ))
    };
    let daily = interval == Interval::Daily;

    match source {
        SourcePreference::Stooq => vec![since(ProviderKind::Stooq)],
        SourcePreference::Yahoo => yahoo_sequence().collect(),
        SourcePreference::Auto => {
            let mut attempts = Vec::new();
            if daily {
                attempts.push(since(ProviderKind::Stooq));
            }
            attempts.extend(yahoo_sequence());
            if daily {
                attempts.push(since(ProviderKind::Stooq));
            }
            attempts
        }
    }
}

pub struct FallbackChain {
    stooq: Arc<dyn DataProvider>,
    yahoo: Arc<dyn DataProvider>,
}

impl FallbackChain {
    pub fn new(stooq: Arc<dyn DataProvider>, yahoo: Arc<dyn DataProvider>) -> Self {
        Self { stooq, yahoo }
    }

    /// Live providers, each behind its own circuit breaker.
    pub fn online() -> Result<Self, DataError> {
        let stooq = StooqProvider::new(Arc::new(CircuitBreaker::default()))?;
        let yahoo = YahooProvider::new(Arc::new(CircuitBreaker::default()))?;
        Ok(Self::new(Arc::new(stooq), Arc::new(yahoo)))
    }

    fn provider(&self, kind: ProviderKind) -> &dyn DataProvider {
        match kind {
            ProviderKind::Stooq => self.stooq.as_ref(),
            ProviderKind::Yahoo => self.yahoo.as_ref(),
        }
    }

    /// Fetch `symbol` from `start` following `source`'s attempt order.
    pub fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        interval: Interval,
        source: SourcePreference,
    ) -> Result<FetchResult, DataError> {
        self.run(symbol, plan(source, start, interval))
    }

    /// Fetch a trailing period, Yahoo first and Stooq for daily bars.
    pub fn fetch_period(
        &self,
        symbol: &str,
        period: &str,
        interval: Interval,
    ) -> Result<FetchResult, DataError> {
        let range = FetchRange::Period(period.to_string());
        let mut attempts = vec![Attempt {
            provider: ProviderKind::Yahoo,
            range: range.clone(),
            interval,
        }];
        if interval == Interval::Daily {
            attempts.push(Attempt {
                provider: ProviderKind::Stooq,
                range,
                interval,
            });
        }
        self.run(symbol, attempts)
    }

    fn run(&self, symbol: &str, attempts: Vec<Attempt>) -> Result<FetchResult, DataError> {
        let mut failures = Vec::with_capacity(attempts.len());
        for attempt in attempts {
            let provider = self.provider(attempt.provider);
            let label = format!("{} {} {}", provider.name(), attempt.range, attempt.interval);
            match provider.fetch(symbol, &attempt.range, attempt.interval) {
                Ok(mut result) => {
                    result.bars = canonicalize(result.bars);
                    if result.bars.is_empty() {
                        tracing::warn!(symbol, attempt = %label, "source returned no bars");
                        failures.push(format!("{label}: empty"));
                        continue;
                    }
                    tracing::info!(
                        symbol,
                        attempt = %label,
                        bars = result.bars.len(),
                        "fetched bars"
                    );
                    return Ok(result);
                }
                Err(e) => {
                    tracing::warn!(symbol, attempt = %label, error = %e, "source failed");
                    failures.push(format!("{label}: {e}"));
                }
            }
        }
        Err(DataError::AllSourcesFailed {
            symbol: symbol.to_string(),
            attempts: failures,
        })
    }
}
