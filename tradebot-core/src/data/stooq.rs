//! Stooq daily data provider.
//!
//! Stooq serves free daily history as a plain CSV download. Symbols without a
//! market suffix are treated as US listings (`AAPL` → `aapl.us`). Only daily
//! bars are available.

use std::sync::Arc;
use std::time::Duration;

use super::circuit_breaker::CircuitBreaker;
use super::csv_import::parse_csv;
use super::provider::{DataError, DataProvider, DataSource, FetchRange, FetchResult, Interval};

pub struct StooqProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl StooqProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            circuit_breaker,
        })
    }

    /// Stooq symbol for a ticker.
    pub fn stooq_symbol(symbol: &str) -> String {
        let s = symbol.trim().to_ascii_lowercase();
        if s.starts_with('^') || s.contains('.') {
            s
        } else {
            format!("{s}.us")
        }
    }

    fn csv_url(symbol: &str) -> String {
        format!(
            "https://stooq.com/q/d/l/?s={}&i=d",
            Self::stooq_symbol(symbol)
        )
    }

    fn download(&self, symbol: &str) -> Result<String, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }
        let resp = self
            .client
            .get(Self::csv_url(symbol))
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            self.circuit_breaker.record_failure();
            return Err(DataError::Other(format!("HTTP {status} for {symbol}")));
        }
        let body = resp
            .text()
            .map_err(|e| DataError::ResponseFormatChanged(e.to_string()))?;
        self.circuit_breaker.record_success();
        Ok(body)
    }
}

/// Parse a Stooq CSV body. Stooq answers unknown symbols with a bare
/// "No data" line instead of an HTTP error.
pub fn parse_stooq_body(symbol: &str, body: &str) -> Result<Vec<crate::domain::Bar>, DataError> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("no data") {
        return Err(DataError::Empty {
            symbol: symbol.to_string(),
        });
    }
    parse_csv(trimmed.as_bytes())
}

impl DataProvider for StooqProvider {
    fn name(&self) -> &str {
        "stooq"
    }

    fn fetch(
        &self,
        symbol: &str,
        range: &FetchRange,
        interval: Interval,
    ) -> Result<FetchResult, DataError> {
        if !self.supports(interval) {
            return Err(DataError::UnsupportedIntervalForProvider {
                provider: self.name().to_string(),
                interval,
            });
        }
        let start = range.start_date(chrono::Utc::now().date_naive())?;
        let body = self.download(symbol)?;
        let bars: Vec<_> = parse_stooq_body(symbol, &body)?
            .into_iter()
            .filter(|b| b.timestamp.date() >= start)
            .collect();
        if bars.is_empty() {
            return Err(DataError::Empty {
                symbol: symbol.to_string(),
            });
        }
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::Stooq,
        })
    }

    fn supports(&self, interval: Interval) -> bool {
        interval == Interval::Daily
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_mapping() {
        assert_eq!(StooqProvider::stooq_symbol("AAPL"), "aapl.us");
        assert_eq!(StooqProvider::stooq_symbol("ERIC-B.ST"), "eric-b.st");
        assert_eq!(StooqProvider::stooq_symbol("^SPX"), "^spx");
    }

    #[test]
    fn parses_stooq_csv() {
        let body = "Date,Open,High,Low,Close,Volume\n\
                    2024-01-02,10,11,9,10.5,1000\n\
                    2024-01-03,10.5,12,10,11.5,2000\n";
        let bars = parse_stooq_body("AAPL", body).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, 11.5);
    }

    #[test]
    fn no_data_is_empty_error() {
        assert!(matches!(
            parse_stooq_body("NOPE", "No data\n"),
            Err(DataError::Empty { .. })
        ));
    }

    #[test]
    fn rejects_hourly() {
        let p = StooqProvider::new(Arc::new(CircuitBreaker::default())).unwrap();
        assert!(!p.supports(Interval::Hourly));
        assert!(matches!(
            p.fetch("AAPL", &FetchRange::Period("1y".into()), Interval::Hourly),
            Err(DataError::UnsupportedIntervalForProvider { .. })
        ));
    }
}
