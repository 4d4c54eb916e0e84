//! Trade: a completed round trip, immutable once recorded.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    /// Fixed stop-loss below the entry fill.
    Stop,
    /// Trailing stop below the high-water mark (percent or chandelier).
    Trail,
    /// Take-profit above the entry fill.
    Tp,
    /// Maximum holding period reached.
    Time,
    /// SELL flag from the signal stage.
    Signal,
    /// Forced close at the end of the series.
    Eod,
}

impl ExitReason {
    pub const ALL: [ExitReason; 6] = [
        ExitReason::Stop,
        ExitReason::Trail,
        ExitReason::Tp,
        ExitReason::Time,
        ExitReason::Signal,
        ExitReason::Eod,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Stop => "STOP",
            ExitReason::Trail => "TRAIL",
            ExitReason::Tp => "TP",
            ExitReason::Time => "TIME",
            ExitReason::Signal => "SIGNAL",
            ExitReason::Eod => "EOD",
        }
    }

    /// Stop-type exits resolve against the bar's extremes rather than its close.
    pub fn is_intrabar(&self) -> bool {
        matches!(self, ExitReason::Stop | ExitReason::Trail | ExitReason::Tp)
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A closed long trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    // ── Entry ──
    pub entry_bar: usize,
    pub entry_timestamp: NaiveDateTime,
    pub entry_trigger: f64,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_bar: usize,
    pub exit_timestamp: NaiveDateTime,
    pub exit_trigger: f64,
    pub exit_price: f64,
    pub exit_reason: ExitReason,

    // ── Size and outcome ──
    pub quantity: f64,
    pub bars_held: usize,
    /// Net return as a fraction, after slippage and both-side fees.
    pub net_return: f64,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.net_return > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.net_return < 0.0
    }

    /// Wall-clock time between entry and exit fills.
    pub fn holding_period(&self) -> Duration {
        self.exit_timestamp - self.entry_timestamp
    }

    /// Profit in currency units for the traded quantity, net of fees.
    pub fn net_pnl(&self) -> f64 {
        self.net_return * self.entry_price * self.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn sample_trade() -> Trade {
        Trade {
            entry_bar: 4,
            entry_timestamp: day(5),
            entry_trigger: 100.0,
            entry_price: 100.0,
            exit_bar: 8,
            exit_timestamp: day(11),
            exit_trigger: 110.0,
            exit_price: 110.0,
            exit_reason: ExitReason::Signal,
            quantity: 50.0,
            bars_held: 4,
            net_return: 0.1,
        }
    }

    #[test]
    fn trade_winner_and_pnl() {
        let t = sample_trade();
        assert!(t.is_winner());
        assert!(!t.is_loser());
        assert!((t.net_pnl() - 500.0).abs() < 1e-9);
    }

    #[test]
    fn holding_period_in_days() {
        assert_eq!(sample_trade().holding_period().num_days(), 6);
    }

    #[test]
    fn exit_reason_serializes_upper_case() {
        let json = serde_json::to_string(&ExitReason::Tp).unwrap();
        assert_eq!(json, "\"TP\"");
        let back: ExitReason = serde_json::from_str("\"EOD\"").unwrap();
        assert_eq!(back, ExitReason::Eod);
    }

    #[test]
    fn only_stop_types_are_intrabar() {
        assert!(ExitReason::Trail.is_intrabar());
        assert!(ExitReason::Tp.is_intrabar());
        assert!(!ExitReason::Time.is_intrabar());
        assert!(!ExitReason::Eod.is_intrabar());
    }
}
