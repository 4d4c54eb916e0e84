//! Watchlist alerting.
//!
//! Each pass fetches recent bars per symbol, takes the `MacdRsi` snapshot of
//! the last bar and compares it with the persisted `AlertState`. A BUY or
//! SELL alert fires only for a new bar or a changed direction. Lines already
//! delivered are remembered by hash so restarts never resend them. Lines the
//! notifier failed to deliver are kept and retried on the next pass.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tradebot_core::data::DataError;
use tradebot_core::domain::Bar;
use tradebot_core::signals::{latest_snapshot, Direction, Snapshot};

use crate::notify::Notifier;

/// Number of delivered-line hashes kept; the oldest are dropped first.
pub const MAX_SEEN: usize = 1000;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt alert state {path}: {source}")]
    State {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("watchlist {path}: {source}")]
    Watchlist {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("watchlist {0} has no 'symbol' column")]
    MissingSymbolColumn(PathBuf),
    #[error("watchlist {0} lists no symbols")]
    EmptyWatchlist(PathBuf),
}

/// Last observation for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolState {
    #[serde(default)]
    pub timestamp: Option<NaiveDateTime>,
    #[serde(default)]
    pub last_signal: Option<Direction>,
}

/// Persistent alert memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertState {
    #[serde(default)]
    pub symbols: BTreeMap<String, SymbolState>,
    /// blake3 hashes of lines already sent, oldest first.
    #[serde(default)]
    pub seen: VecDeque<String>,
    /// Lines whose delivery failed, resent on the next pass.
    #[serde(default)]
    pub pending: Vec<String>,
}

/// A fired BUY or SELL alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub symbol: String,
    pub direction: Direction,
    pub snapshot: Snapshot,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.snapshot;
        let reason = match self.direction {
            Direction::Buy => format!("MACD↑ & RSI {:.1}>50", s.rsi),
            Direction::Sell => format!("MACD↓ or RSI {:.1}<45", s.rsi),
        };
        write!(
            f,
            "{} {}: {} signal (price ~ {:.2}) | {}",
            self.symbol, s.timestamp, self.direction, s.price, reason
        )
    }
}

/// Status line for a symbol without a signal.
pub fn quiet_line(symbol: &str, s: &Snapshot) -> String {
    format!(
        "{symbol} {}: no signal | price {:.2}, RSI {:.1}, MACD {:.4} vs {:.4}",
        s.timestamp, s.price, s.rsi, s.macd, s.signal
    )
}

impl AlertState {
    /// Load state from `path`. A missing file is an empty state.
    pub fn load(path: &Path) -> Result<Self, AlertError> {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(AlertError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&text).map_err(|source| AlertError::State {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), AlertError> {
        let io_err = |source| AlertError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| AlertError::State {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(io_err)
    }

    /// Record `snapshot` for `symbol`; returns an alert if one should fire.
    pub fn observe(&mut self, symbol: &str, snapshot: &Snapshot) -> Option<Alert> {
        let entry = self.symbols.entry(symbol.to_string()).or_default();
        let Some(direction) = snapshot.direction() else {
            entry.timestamp = Some(snapshot.timestamp);
            return None;
        };
        if entry.timestamp == Some(snapshot.timestamp) && entry.last_signal == Some(direction) {
            return None;
        }
        entry.timestamp = Some(snapshot.timestamp);
        entry.last_signal = Some(direction);
        Some(Alert {
            symbol: symbol.to_string(),
            direction,
            snapshot: *snapshot,
        })
    }

    pub fn has_seen(&self, line: &str) -> bool {
        let hash = line_hash(line);
        self.seen.iter().any(|h| *h == hash)
    }

    /// Mark `line` as sent. Returns `false` if it was already known.
    pub fn remember(&mut self, line: &str) -> bool {
        if self.has_seen(line) {
            return false;
        }
        self.seen.push_back(line_hash(line));
        while self.seen.len() > MAX_SEEN {
            self.seen.pop_front();
        }
        true
    }
}

pub fn line_hash(line: &str) -> String {
    blake3::hash(line.trim().as_bytes()).to_hex().to_string()
}

/// What one alert pass did.
#[derive(Debug, Clone, Default)]
pub struct AlertReport {
    pub alerts: Vec<Alert>,
    /// Status lines for symbols without a signal.
    pub quiet: Vec<String>,
    /// `(symbol, error)` for symbols that could not be evaluated.
    pub failures: Vec<(String, String)>,
    /// Lines offered to the notifier: earlier undelivered lines first, then
    /// alert lines not seen in any earlier pass.
    pub new_lines: Vec<String>,
    /// Whether the notifier confirmed delivery of `new_lines`.
    pub delivered: bool,
}

/// Run one pass over `symbols`.
///
/// Failures for one symbol are logged and recorded; the rest of the batch
/// still runs.
pub fn run_alert_pass<F>(
    mut state: AlertState,
    symbols: &[String],
    fetch: F,
    notifier: &dyn Notifier,
) -> (AlertState, AlertReport)
where
    F: Fn(&str) -> Result<Vec<Bar>, DataError>,
{
    let mut report = AlertReport::default();

    for symbol in symbols {
        let bars = match fetch(symbol) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "alert fetch failed");
                report.failures.push((symbol.clone(), e.to_string()));
                continue;
            }
        };
        let Some(snapshot) = latest_snapshot(&bars) else {
            tracing::warn!(symbol = %symbol, bars = bars.len(), "not enough bars for a snapshot");
            report
                .failures
                .push((symbol.clone(), format!("only {} bars", bars.len())));
            continue;
        };
        match state.observe(symbol, &snapshot) {
            Some(alert) => {
                tracing::info!(symbol = %symbol, direction = %alert.direction, "signal");
                report.alerts.push(alert);
            }
            None if snapshot.direction().is_none() => {
                report.quiet.push(quiet_line(symbol, &snapshot));
            }
            None => {}
        }
    }

    report.new_lines = std::mem::take(&mut state.pending);
    for alert in &report.alerts {
        let line = alert.to_string();
        if !state.has_seen(&line) && !report.new_lines.contains(&line) {
            report.new_lines.push(line);
        }
    }

    if !report.new_lines.is_empty() {
        let message = format!("New signals:\n{}", report.new_lines.join("\n"));
        report.delivered = notifier.send(&message);
        tracing::info!(
            notifier = notifier.name(),
            lines = report.new_lines.len(),
            delivered = report.delivered,
            "alert message dispatched"
        );
        if report.delivered {
            for line in &report.new_lines {
                state.remember(line);
            }
        } else {
            let skip = report.new_lines.len().saturating_sub(MAX_SEEN);
            state.pending = report.new_lines[skip..].to_vec();
        }
    }

    (state, report)
}

/// Read the `symbol` column of a watchlist CSV. Blank entries are skipped.
pub fn load_watchlist(path: &Path) -> Result<Vec<String>, AlertError> {
    let csv_err = |source| AlertError::Watchlist {
        path: path.to_path_buf(),
        source,
    };
    let mut rdr = csv::Reader::from_path(path).map_err(csv_err)?;
    let col = rdr
        .headers()
        .map_err(csv_err)?
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("symbol"))
        .ok_or_else(|| AlertError::MissingSymbolColumn(path.to_path_buf()))?;

    let mut symbols = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(csv_err)?;
        if let Some(sym) = record.get(col).map(str::trim).filter(|s| !s.is_empty()) {
            symbols.push(sym.to_string());
        }
    }
    if symbols.is_empty() {
        return Err(AlertError::EmptyWatchlist(path.to_path_buf()));
    }
    Ok(symbols)
}
