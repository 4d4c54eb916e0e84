//! Yahoo Finance data provider.
//!
//! Fetches OHLCV bars from Yahoo's v8 chart API. Handles rate limiting,
//! retries with exponential backoff, response parsing, and the circuit breaker.
//!
//! Yahoo has no official API and is subject to unannounced format changes.
//! The fallback chain treats any failure here as "try the next source".

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, DataProvider, DataSource, FetchRange, FetchResult, Interval};
use crate::domain::Bar;

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds.
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    /// Build the chart API URL for a symbol, range and interval.
    fn chart_url(symbol: &str, range: &FetchRange, interval: Interval) -> String {
        let window = match range {
            FetchRange::Since(start) => {
                let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
                let end_ts = Utc::now().timestamp();
                format!("period1={start_ts}&period2={end_ts}")
            }
            FetchRange::Period(p) => format!("range={p}"),
        };
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
             ?{window}&interval={interval}&includePrePost=false"
        )
    }

    /// Parse the chart API response into bars.
    ///
    /// Rows with any missing OHLC value are dropped. Daily and weekly bars are
    /// stamped at midnight of the exchange-local date; hourly bars keep their
    /// exchange-local open time.
    fn parse_response(
        symbol: &str,
        interval: Interval,
        resp: ChartResponse,
    ) -> Result<Vec<Bar>, DataError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        let offset = data.meta.as_ref().map_or(0, |m| m.gmtoffset);
        let timestamps = data.timestamp.unwrap_or_default();
        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let field = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
            let (Some(open), Some(high), Some(low), Some(close)) = (
                field(&quote.open),
                field(&quote.high),
                field(&quote.low),
                field(&quote.close),
            ) else {
                continue;
            };
            let timestamp = local_timestamp(ts + offset, interval).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
            })?;
            let volume = field(&quote.volume).unwrap_or(0.0);
            bars.push(Bar::new(timestamp, open, high, low, close, volume));
        }

        if bars.is_empty() {
            return Err(DataError::Empty {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }

    /// Execute the request with retry and circuit breaker logic.
    fn fetch_with_retry(
        &self,
        symbol: &str,
        range: &FetchRange,
        interval: Interval,
    ) -> Result<Vec<Bar>, DataError> {
        let url = Self::chart_url(symbol, range, interval);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                tracing::warn!(symbol, attempt, ?delay, "retrying Yahoo request");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let resp = match self.client.get(&url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();
            if status == reqwest::StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }
            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                continue;
            }

            let chart: ChartResponse = resp.json().map_err(|e| {
                DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
            })?;
            let bars = Self::parse_response(symbol, interval, chart)?;
            self.circuit_breaker.record_success();
            return Ok(bars);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

/// Exchange-local timestamp, truncated to midnight for daily and weekly bars.
fn local_timestamp(secs: i64, interval: Interval) -> Option<NaiveDateTime> {
    let dt = DateTime::from_timestamp(secs, 0)?.naive_utc();
    if interval.is_intraday() {
        Some(dt)
    } else {
        Some(dt.date().and_time(chrono::NaiveTime::MIN))
    }
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo"
    }

    fn fetch(
        &self,
        symbol: &str,
        range: &FetchRange,
        interval: Interval,
    ) -> Result<FetchResult, DataError> {
        let bars = self.fetch_with_retry(symbol, range, interval)?;
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::YahooFinance,
        })
    }

    fn supports(&self, _interval: Interval) -> bool {
        true
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const SAMPLE: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"gmtoffset": 7200},
                "timestamp": [1704265200, 1704351600, 1704438000],
                "indicators": {"quote": [{
                    "open":   [10.0, 10.5, null],
                    "high":   [11.0, 11.5, 12.0],
                    "low":    [9.5, 10.0, 11.0],
                    "close":  [10.5, 11.0, 11.5],
                    "volume": [1000, null, 3000]
                }]}
            }],
            "error": null
        }
    }"#;

    #[test]
    fn parses_and_drops_incomplete_rows() {
        let resp: ChartResponse = serde_json::from_str(SAMPLE).unwrap();
        let bars = YahooProvider::parse_response("ERIC-B.ST", Interval::Daily, resp).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(
            bars[0].timestamp,
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );
        assert_eq!(bars[1].volume, 0.0);
    }

    #[test]
    fn hourly_keeps_time_of_day() {
        let resp: ChartResponse = serde_json::from_str(SAMPLE).unwrap();
        let bars = YahooProvider::parse_response("ERIC-B.ST", Interval::Hourly, resp).unwrap();
        // 1704265200 = 2024-01-03 07:00 UTC, +2h offset
        assert_eq!(
            bars[0].timestamp,
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap().and_hms_opt(9, 0, 0).unwrap()
        );
    }

    #[test]
    fn not_found_error_maps_to_symbol_not_found() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#;
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            YahooProvider::parse_response("NOPE", Interval::Daily, resp),
            Err(DataError::SymbolNotFound { .. })
        ));
    }

    #[test]
    fn url_uses_range_for_periods() {
        let url = YahooProvider::chart_url("SPY", &FetchRange::Period("6mo".into()), Interval::Daily);
        assert!(url.contains("range=6mo"));
        assert!(url.contains("interval=1d"));
        let since = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let url = YahooProvider::chart_url("SPY", &FetchRange::Since(since), Interval::Hourly);
        assert!(url.contains("period1=1672531200"));
        assert!(url.contains("interval=1h"));
    }
}
