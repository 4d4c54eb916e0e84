//! Parameter-sweep leaderboard.
//!
//! One row per accepted parameter combination, statistics converted to
//! percent for reading. Rows are kept sorted best-first by a `SortKey`.

use std::cmp::Ordering;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use tradebot_core::engine::Statistics;

/// One point of the sweep grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepParams {
    pub rsi_buy: f64,
    pub rsi_sell: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub trailing_stop_pct: f64,
    pub time_stop_bars: usize,
}

impl fmt::Display for SweepParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rsi_buy={}, rsi_sell={}, sl_pct={}, tp_pct={}, trail_pct={}, tstop_bars={}",
            self.rsi_buy,
            self.rsi_sell,
            self.stop_loss_pct,
            self.take_profit_pct,
            self.trailing_stop_pct,
            self.time_stop_bars
        )
    }
}

/// Leaderboard row: parameters plus percent statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub params: SweepParams,
    pub trades: usize,
    pub total_return_pct: f64,
    pub cagr_pct: f64,
    pub winrate_pct: f64,
    pub profit_factor: f64,
    pub expectancy_pct_per_trade: f64,
    /// Negative: -12.5 means a 12.5% peak-to-trough decline.
    pub max_drawdown_pct: f64,
    pub avg_win_pct: f64,
    pub avg_loss_pct: f64,
}

impl LeaderboardRow {
    pub fn from_stats(params: SweepParams, stats: &Statistics) -> Self {
        Self {
            params,
            trades: stats.trades,
            total_return_pct: stats.total_return * 100.0,
            cagr_pct: stats.cagr * 100.0,
            winrate_pct: stats.win_rate * 100.0,
            profit_factor: stats.profit_factor,
            expectancy_pct_per_trade: stats.expectancy * 100.0,
            max_drawdown_pct: stats.max_drawdown * 100.0,
            avg_win_pct: stats.avg_win * 100.0,
            avg_loss_pct: stats.avg_loss * 100.0,
        }
    }
}

/// Column the leaderboard is sorted by, descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Cagr,
    TotalReturn,
    ProfitFactor,
    Trades,
    WinRate,
    Expectancy,
    /// Least negative drawdown first.
    MaxDrawdown,
}

impl SortKey {
    pub fn value(&self, row: &LeaderboardRow) -> f64 {
        match self {
            SortKey::Cagr => row.cagr_pct,
            SortKey::TotalReturn => row.total_return_pct,
            SortKey::ProfitFactor => row.profit_factor,
            SortKey::Trades => row.trades as f64,
            SortKey::WinRate => row.winrate_pct,
            SortKey::Expectancy => row.expectancy_pct_per_trade,
            SortKey::MaxDrawdown => row.max_drawdown_pct,
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    /// Accepts both the short name and the CSV column name (`cagr_pct`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cagr" | "cagr_pct" => Ok(SortKey::Cagr),
            "total_return" | "total_return_pct" => Ok(SortKey::TotalReturn),
            "profit_factor" | "pf" => Ok(SortKey::ProfitFactor),
            "trades" => Ok(SortKey::Trades),
            "win_rate" | "winrate" | "winrate_pct" => Ok(SortKey::WinRate),
            "expectancy" | "expectancy_pct_per_trade" => Ok(SortKey::Expectancy),
            "max_drawdown" | "max_drawdown_pct" => Ok(SortKey::MaxDrawdown),
            other => Err(format!("unknown sort key '{other}'")),
        }
    }
}

/// CSV header, in column order.
pub const CSV_COLUMNS: [&str; 15] = [
    "rsi_buy",
    "rsi_sell",
    "sl_pct",
    "tp_pct",
    "trail_pct",
    "tstop_bars",
    "trades",
    "total_return_pct",
    "cagr_pct",
    "winrate_pct",
    "profit_factor",
    "expectancy_pct_per_trade",
    "max_drawdown_pct",
    "avg_win_pct",
    "avg_loss_pct",
];

/// Sorted sweep results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub rows: Vec<LeaderboardRow>,
    pub sort_key: SortKey,
}

impl Leaderboard {
    /// Build a leaderboard sorted best-first. NaN sort values go last.
    pub fn new(mut rows: Vec<LeaderboardRow>, sort_key: SortKey) -> Self {
        rows.sort_by(|a, b| {
            let (va, vb) = (sort_key.value(a), sort_key.value(b));
            match (va.is_nan(), vb.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => vb.total_cmp(&va),
            }
        });
        Self { rows, sort_key }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn best(&self) -> Option<&LeaderboardRow> {
        self.rows.first()
    }

    pub fn top(&self, n: usize) -> &[LeaderboardRow] {
        &self.rows[..n.min(self.rows.len())]
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(CSV_COLUMNS)?;
        for r in &self.rows {
            let p = &r.params;
            wtr.write_record([
                p.rsi_buy.to_string(),
                p.rsi_sell.to_string(),
                p.stop_loss_pct.to_string(),
                p.take_profit_pct.to_string(),
                p.trailing_stop_pct.to_string(),
                p.time_stop_bars.to_string(),
                r.trades.to_string(),
                format!("{:.4}", r.total_return_pct),
                format!("{:.4}", r.cagr_pct),
                format!("{:.4}", r.winrate_pct),
                format!("{:.4}", r.profit_factor),
                format!("{:.4}", r.expectancy_pct_per_trade),
                format!("{:.4}", r.max_drawdown_pct),
                format!("{:.4}", r.avg_win_pct),
                format!("{:.4}", r.avg_loss_pct),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_csv(&self) -> csv::Result<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Fixed-width table of the first `n` rows for terminal output.
    pub fn format_table(&self, n: usize) -> String {
        let mut out = format!(
            "{:>7} {:>8} {:>6} {:>6} {:>6} {:>5} {:>6} {:>9} {:>8} {:>7} {:>6} {:>8}\n",
            "rsi_buy", "rsi_sell", "sl", "tp", "trail", "tstop", "trades", "total%", "cagr%",
            "win%", "pf", "maxdd%"
        );
        for r in self.top(n) {
            let p = &r.params;
            out.push_str(&format!(
                "{:>7} {:>8} {:>6.1} {:>6.1} {:>6.1} {:>5} {:>6} {:>9.2} {:>8.2} {:>7.1} {:>6.2} {:>8.2}\n",
                p.rsi_buy,
                p.rsi_sell,
                p.stop_loss_pct,
                p.take_profit_pct,
                p.trailing_stop_pct,
                p.time_stop_bars,
                r.trades,
                r.total_return_pct,
                r.cagr_pct,
                r.winrate_pct,
                r.profit_factor,
                r.max_drawdown_pct
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cagr: f64, pf: f64, dd: f64) -> LeaderboardRow {
        LeaderboardRow {
            params: SweepParams {
                rsi_buy: 50.0,
                rsi_sell: 58.0,
                stop_loss_pct: 0.0,
                take_profit_pct: 0.0,
                trailing_stop_pct: 0.0,
                time_stop_bars: 0,
            },
            trades: 25,
            total_return_pct: cagr * 2.0,
            cagr_pct: cagr,
            winrate_pct: 55.0,
            profit_factor: pf,
            expectancy_pct_per_trade: 0.4,
            max_drawdown_pct: dd,
            avg_win_pct: 2.0,
            avg_loss_pct: -1.5,
        }
    }

    #[test]
    fn sorts_descending_by_key() {
        let lb = Leaderboard::new(
            vec![row(5.0, 1.5, -20.0), row(12.0, 1.3, -25.0), row(8.0, 2.0, -10.0)],
            SortKey::Cagr,
        );
        let cagrs: Vec<f64> = lb.rows.iter().map(|r| r.cagr_pct).collect();
        assert_eq!(cagrs, vec![12.0, 8.0, 5.0]);

        let lb = Leaderboard::new(lb.rows, SortKey::MaxDrawdown);
        assert_eq!(lb.best().unwrap().max_drawdown_pct, -10.0);
    }

    #[test]
    fn nan_sorts_last() {
        let lb = Leaderboard::new(
            vec![row(1.0, f64::NAN, -5.0), row(2.0, 1.4, -5.0)],
            SortKey::ProfitFactor,
        );
        assert_eq!(lb.rows[0].profit_factor, 1.4);
        assert!(lb.rows[1].profit_factor.is_nan());
    }

    #[test]
    fn csv_has_expected_columns() {
        let lb = Leaderboard::new(vec![row(12.0, 1.3, -25.0)], SortKey::Cagr);
        let csv = lb.to_csv().unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), CSV_COLUMNS.join(","));
        let fields: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(fields.len(), 15);
        assert_eq!(fields[0], "50");
        assert_eq!(fields[8], "12.0000");
    }

    #[test]
    fn sort_key_accepts_column_names() {
        assert_eq!("cagr_pct".parse::<SortKey>().unwrap(), SortKey::Cagr);
        assert_eq!("trades".parse::<SortKey>().unwrap(), SortKey::Trades);
        assert!("sharpe".parse::<SortKey>().is_err());
    }
}
