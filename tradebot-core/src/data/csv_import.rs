//! CSV import and export of OHLCV bars.
//!
//! Headers are matched case-insensitively:
//! - timestamp: `date`, `datetime`, `timestamp` or `time`
//! - `open`, `high`, `low`, `close` (required)
//! - `volume` (optional, 0 when absent)
//!
//! Rows with a missing or unparsable value are dropped, like a `dropna()`.
//! The result is canonicalized (sorted, de-duplicated).

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use super::canonicalize::canonicalize;
use super::provider::DataError;
use crate::domain::Bar;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y", "%Y%m%d"];

struct Columns {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, DataError> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        };
        let timestamp = find(&["date", "datetime", "timestamp", "time"]);
        let open = find(&["open"]);
        let high = find(&["high"]);
        let low = find(&["low"]);
        let close = find(&["close"]);

        let missing: Vec<String> = [
            ("date", timestamp),
            ("open", open),
            ("high", high),
            ("low", low),
            ("close", close),
        ]
        .iter()
        .filter(|(_, idx)| idx.is_none())
        .map(|(name, _)| name.to_string())
        .collect();

        match (timestamp, open, high, low, close) {
            (Some(timestamp), Some(open), Some(high), Some(low), Some(close)) => Ok(Self {
                timestamp,
                open,
                high,
                low,
                close,
                volume: find(&["volume", "vol"]),
            }),
            _ => Err(DataError::MissingColumns(missing)),
        }
    }

    fn parse_row(&self, row: &csv::StringRecord) -> Option<Bar> {
        let num = |idx: usize| -> Option<f64> {
            let v: f64 = row.get(idx)?.trim().parse().ok()?;
            v.is_finite().then_some(v)
        };
        let timestamp = parse_timestamp(row.get(self.timestamp)?)?;
        let volume = match self.volume {
            Some(idx) => num(idx)?,
            None => 0.0,
        };
        Some(Bar::new(
            timestamp,
            num(self.open)?,
            num(self.high)?,
            num(self.low)?,
            num(self.close)?,
            volume,
        ))
    }
}

/// Parse a timestamp in any of the accepted layouts.
///
/// Offsets (`2024-01-02 09:00:00+01:00`) are dropped, keeping exchange-local time.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.naive_local());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
}

/// Parse bars from any CSV reader.
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<Bar>, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let columns = Columns::from_headers(rdr.headers()?)?;

    let mut bars = Vec::new();
    let mut dropped = 0usize;
    for record in rdr.records() {
        match columns.parse_row(&record?) {
            Some(bar) => bars.push(bar),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        tracing::debug!(dropped, kept = bars.len(), "dropped incomplete CSV rows");
    }
    Ok(canonicalize(bars))
}

/// Load bars from a CSV file.
pub fn load_csv(path: &Path) -> Result<Vec<Bar>, DataError> {
    let file = File::open(path)?;
    let bars = parse_csv(file)?;
    tracing::info!(path = %path.display(), bars = bars.len(), "loaded CSV");
    Ok(bars)
}

/// Write bars as `Date,Open,High,Low,Close,Volume`.
///
/// Midnight timestamps are written as plain dates.
pub fn write_csv<W: Write>(writer: W, bars: &[Bar]) -> Result<(), DataError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["Date", "Open", "High", "Low", "Close", "Volume"])?;
    for bar in bars {
        let ts = if bar.timestamp.time() == chrono::NaiveTime::MIN {
            bar.timestamp.format("%Y-%m-%d").to_string()
        } else {
            bar.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
        };
        wtr.write_record([
            ts,
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write bars to a CSV file, creating parent directories.
pub fn save_csv(path: &Path, bars: &[Bar]) -> Result<(), DataError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_csv(File::create(path)?, bars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitive_headers() {
        let csv = "DATE,Open,HIGH,low,Close,Adj Close,Volume\n\
                   2024-01-03,10,11,9,10.5,10.4,100\n\
                   2024-01-02,9,10,8,9.5,9.4,200\n";
        let bars = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(bars.len(), 2);
        // sorted ascending
        assert_eq!(bars[0].close, 9.5);
        assert_eq!(bars[1].volume, 100.0);
    }

    #[test]
    fn missing_columns_listed() {
        let csv = "timestamp,open,close\n2024-01-02,1,2\n";
        match parse_csv(csv.as_bytes()) {
            Err(DataError::MissingColumns(cols)) => {
                assert_eq!(cols, vec!["high".to_string(), "low".to_string()]);
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn drops_rows_with_missing_values() {
        let csv = "Date,Open,High,Low,Close\n\
                   2024-01-02,1,2,0.5,1.5\n\
                   2024-01-03,,2,0.5,1.5\n\
                   2024-01-04,1,2,0.5,NaN\n\
                   not-a-date,1,2,0.5,1.5\n";
        let bars = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].volume, 0.0);
    }

    #[test]
    fn timestamp_formats() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(parse_timestamp("2024-03-05"), d.and_hms_opt(0, 0, 0));
        assert_eq!(parse_timestamp("05.03.2024"), d.and_hms_opt(0, 0, 0));
        assert_eq!(parse_timestamp("2024-03-05 14:30:00"), d.and_hms_opt(14, 30, 0));
        assert_eq!(parse_timestamp("2024-03-05 14:30:00+01:00"), d.and_hms_opt(14, 30, 0));
        assert_eq!(parse_timestamp("2024-03-05T14:30:00Z"), d.and_hms_opt(14, 30, 0));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn write_then_parse_preserves_bars() {
        let csv = "Date,Open,High,Low,Close,Volume\n\
                   2024-01-02,1,2,0.5,1.5,10\n\
                   2024-01-03,1.5,2.5,1,2,20\n";
        let bars = parse_csv(csv.as_bytes()).unwrap();
        let mut out = Vec::new();
        write_csv(&mut out, &bars).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Date,Open,High,Low,Close,Volume\n2024-01-02,"));
        assert_eq!(parse_csv(text.as_bytes()).unwrap(), bars);
    }

    #[test]
    fn save_creates_parent_dirs_and_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("SPY_1d.csv");
        let csv = "Date,Open,High,Low,Close,Volume\n2024-01-02,1,2,0.5,1.5,10\n";
        let bars = parse_csv(csv.as_bytes()).unwrap();
        save_csv(&path, &bars).unwrap();
        assert_eq!(load_csv(&path).unwrap(), bars);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_csv(&dir.path().join("absent.csv")),
            Err(DataError::Io(_))
        ));
    }
}
