//! Ledger statistics: pure functions over the trade list and equity curve.
//!
//! Everything is a fraction. Multiplying by 100 is a presentation concern.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{ExitReason, Trade};

/// Lower bound on the elapsed span used by CAGR, in days.
pub const MIN_ELAPSED_DAYS: f64 = 1e-6;

/// Summary statistics for one backtest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub trades: usize,
    pub win_rate: f64,
    /// Gross gains over gross losses. NaN when no trade lost money.
    #[serde(with = "non_finite_as_null")]
    pub profit_factor: f64,
    pub expectancy: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
    pub total_return: f64,
    #[serde(with = "non_finite_as_null")]
    pub cagr: f64,
    pub max_drawdown: f64,
    pub final_equity: f64,
    pub bars: usize,
    /// Fraction of bars that ended with an open position.
    pub exposure: f64,
    pub exit_counts: BTreeMap<ExitReason, usize>,
}

impl Statistics {
    /// Compute all statistics.
    ///
    /// `first` and `last` are the timestamps of the first and last bar.
    pub fn compute(
        trades: &[Trade],
        equity_curve: &[f64],
        in_position: &[bool],
        first: NaiveDateTime,
        last: NaiveDateTime,
    ) -> Self {
        let returns: Vec<f64> = trades.iter().map(|t| t.net_return).collect();
        let final_equity = equity_curve.last().copied().unwrap_or(1.0);
        let bars = in_position.len();
        let exposure = if bars == 0 {
            0.0
        } else {
            in_position.iter().filter(|&&b| b).count() as f64 / bars as f64
        };

        let mut exit_counts = BTreeMap::new();
        for t in trades {
            *exit_counts.entry(t.exit_reason).or_insert(0) += 1;
        }

        Self {
            trades: trades.len(),
            win_rate: win_rate(&returns),
            profit_factor: profit_factor(&returns),
            expectancy: expectancy(&returns),
            avg_win: mean_f64(&wins(&returns)),
            avg_loss: mean_f64(&losses(&returns)),
            best_trade: extreme(&returns, f64::NEG_INFINITY, f64::max),
            worst_trade: extreme(&returns, f64::INFINITY, f64::min),
            total_return: final_equity - 1.0,
            cagr: cagr(final_equity, elapsed_days(first, last)),
            max_drawdown: max_drawdown(equity_curve),
            final_equity,
            bars,
            exposure,
            exit_counts,
        }
    }

    pub fn exits(&self, reason: ExitReason) -> usize {
        self.exit_counts.get(&reason).copied().unwrap_or(0)
    }
}

// ─── Individual statistic functions ─────────────────────────────────

/// Largest or smallest return; 0 with no trades.
fn extreme(returns: &[f64], init: f64, pick: fn(f64, f64) -> f64) -> f64 {
    if returns.is_empty() {
        0.0
    } else {
        returns.iter().copied().fold(init, pick)
    }
}

fn wins(returns: &[f64]) -> Vec<f64> {
    returns.iter().copied().filter(|r| *r > 0.0).collect()
}

fn losses(returns: &[f64]) -> Vec<f64> {
    returns.iter().copied().filter(|r| *r < 0.0).collect()
}

/// Fraction of trades with a positive net return; 0 with no trades.
pub fn win_rate(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    wins(returns).len() as f64 / returns.len() as f64
}

/// Sum of gains over the absolute sum of losses. NaN without losing trades.
pub fn profit_factor(returns: &[f64]) -> f64 {
    let gross_loss: f64 = losses(returns).iter().sum::<f64>().abs();
    if gross_loss == 0.0 {
        return f64::NAN;
    }
    wins(returns).iter().sum::<f64>() / gross_loss
}

/// `win_rate * mean(wins) + (1 - win_rate) * mean(losses)`.
pub fn expectancy(returns: &[f64]) -> f64 {
    let wr = win_rate(returns);
    wr * mean_f64(&wins(returns)) + (1.0 - wr) * mean_f64(&losses(returns))
}

/// Most negative `equity / running_peak - 1`; 0 for a never-falling curve.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = eq / peak - 1.0;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Days between two timestamps, fractional for intraday spans.
pub fn elapsed_days(first: NaiveDateTime, last: NaiveDateTime) -> f64 {
    (last - first).num_seconds() as f64 / 86_400.0
}

/// `final_equity ^ (365.25 / days) - 1`, or -1 when equity is wiped out.
pub fn cagr(final_equity: f64, days: f64) -> f64 {
    if final_equity <= 0.0 {
        return -1.0;
    }
    let days = days.max(MIN_ELAPSED_DAYS);
    final_equity.powf(365.25 / days) - 1.0
}

/// Arithmetic mean; 0 for an empty slice.
pub fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// NaN and infinities serialize as JSON `null` and come back as NaN.
mod non_finite_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}
