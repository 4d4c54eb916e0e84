//! Parameter sweep over the RSI-threshold strategy.
//!
//! A `SweepGrid` expands into the cartesian product of thresholds and exit
//! settings. Each combination is a full backtest; results that pass the
//! `SweepCriteria` land on a `Leaderboard`. Signal series are computed once
//! per threshold pair and shared by every exit combination.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tradebot_core::domain::{Bar, SignalSeries};
use tradebot_core::engine::{run_backtest, EngineConfig, EngineError, Statistics};
use tradebot_core::signals::{RsiThreshold, SignalConfigError, SignalGenerator};

use crate::leaderboard::{Leaderboard, LeaderboardRow, SortKey, SweepParams};

/// Each side of a train/test split needs at least this many bars.
pub const MIN_SPLIT_BARS: usize = 50;

/// Tolerance when deciding whether the range end is reached.
const RANGE_EPSILON: f64 = 1e-12;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("invalid range '{spec}': {reason}")]
    InvalidRange { spec: String, reason: String },
    #[error("split leaves {train} train / {test} test bars, need at least {min} on each side")]
    InsufficientData { train: usize, test: usize, min: usize },
    #[error(transparent)]
    Signal(#[from] SignalConfigError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

fn invalid(spec: &str, reason: impl Into<String>) -> SweepError {
    SweepError::InvalidRange {
        spec: spec.to_string(),
        reason: reason.into(),
    }
}

/// Split `a`, `a:b` or `a:b:step` into its parts.
fn range_parts(spec: &str) -> Result<Vec<&str>, SweepError> {
    let parts: Vec<&str> = spec.trim().split(':').map(str::trim).collect();
    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(invalid(spec, "expected value, start:end or start:end:step"));
    }
    Ok(parts)
}

/// Parse an inclusive integer range such as `30:50:2`.
///
/// A bare value yields a single element; `a:b` steps by one.
pub fn parse_int_range(spec: &str) -> Result<Vec<usize>, SweepError> {
    let parts = range_parts(spec)?;
    let nums = parts
        .iter()
        .map(|p| p.parse::<usize>().map_err(|e| invalid(spec, e.to_string())))
        .collect::<Result<Vec<_>, _>>()?;
    let (start, end, step) = match nums.as_slice() {
        [v] => return Ok(vec![*v]),
        [a, b] => (*a, *b, 1),
        [a, b, s] => (*a, *b, *s),
        _ => return Err(invalid(spec, "too many parts")),
    };
    if step == 0 {
        return Err(invalid(spec, "step must be positive"));
    }
    if start > end {
        return Err(invalid(spec, "start exceeds end"));
    }
    Ok((start..=end).step_by(step).collect())
}

/// Parse an inclusive float range such as `0:5:0.5`.
///
/// Values are `start + k * step`, rounded to 10 decimals so `0.1` steps
/// print cleanly.
pub fn parse_float_range(spec: &str) -> Result<Vec<f64>, SweepError> {
    let parts = range_parts(spec)?;
    let nums = parts
        .iter()
        .map(|p| match p.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            Ok(v) => Err(invalid(spec, format!("{v} is not finite"))),
            Err(e) => Err(invalid(spec, e.to_string())),
        })
        .collect::<Result<Vec<_>, _>>()?;
    let (start, end, step) = match nums.as_slice() {
        [v] => return Ok(vec![*v]),
        [a, b] => (*a, *b, 1.0),
        [a, b, s] => (*a, *b, *s),
        _ => return Err(invalid(spec, "too many parts")),
    };
    if step <= 0.0 {
        return Err(invalid(spec, "step must be positive"));
    }
    if start > end {
        return Err(invalid(spec, "start exceeds end"));
    }
    let steps = ((end - start) / step + RANGE_EPSILON).floor() as usize;
    Ok((0..=steps)
        .map(|k| round10(start + k as f64 * step))
        .collect())
}

fn round10(v: f64) -> f64 {
    (v * 1e10).round() / 1e10
}

/// Axes of the sweep. Every axis holds at least one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepGrid {
    pub rsi_buy: Vec<f64>,
    pub rsi_sell: Vec<f64>,
    pub stop_loss_pct: Vec<f64>,
    pub take_profit_pct: Vec<f64>,
    pub trailing_stop_pct: Vec<f64>,
    pub time_stop_bars: Vec<usize>,
}

impl Default for SweepGrid {
    fn default() -> Self {
        Self {
            rsi_buy: vec![52.0],
            rsi_sell: vec![59.0],
            stop_loss_pct: vec![0.0],
            take_profit_pct: vec![0.0],
            trailing_stop_pct: vec![0.0],
            time_stop_bars: vec![0],
        }
    }
}

impl SweepGrid {
    fn exit_combinations(&self) -> usize {
        self.stop_loss_pct.len()
            * self.take_profit_pct.len()
            * self.trailing_stop_pct.len()
            * self.time_stop_bars.len()
    }

    /// Every runnable combination. Pairs with `rsi_buy >= rsi_sell` are skipped.
    pub fn combinations(&self) -> Vec<SweepParams> {
        let mut out = Vec::new();
        for &rsi_buy in &self.rsi_buy {
            for &rsi_sell in &self.rsi_sell {
                if rsi_buy >= rsi_sell {
                    continue;
                }
                for &stop_loss_pct in &self.stop_loss_pct {
                    for &take_profit_pct in &self.take_profit_pct {
                        for &trailing_stop_pct in &self.trailing_stop_pct {
                            for &time_stop_bars in &self.time_stop_bars {
                                out.push(SweepParams {
                                    rsi_buy,
                                    rsi_sell,
                                    stop_loss_pct,
                                    take_profit_pct,
                                    trailing_stop_pct,
                                    time_stop_bars,
                                });
                            }
                        }
                    }
                }
            }
        }
        out
    }

    /// Combinations dropped by `combinations()`.
    pub fn degenerate_count(&self) -> usize {
        let pairs = self
            .rsi_buy
            .iter()
            .flat_map(|b| self.rsi_sell.iter().map(move |s| (b, s)))
            .filter(|(b, s)| b >= s)
            .count();
        pairs * self.exit_combinations()
    }

    pub fn size(&self) -> usize {
        self.rsi_buy.len() * self.rsi_sell.len() * self.exit_combinations()
    }
}

/// Acceptance filter for leaderboard rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepCriteria {
    pub min_trades: usize,
    /// Largest tolerated drawdown magnitude, in percent.
    pub max_drawdown_pct: f64,
    pub min_profit_factor: f64,
}

impl Default for SweepCriteria {
    fn default() -> Self {
        Self {
            min_trades: 20,
            max_drawdown_pct: 30.0,
            min_profit_factor: 1.2,
        }
    }
}

impl SweepCriteria {
    /// Accept everything with at least one trade.
    pub fn permissive() -> Self {
        Self {
            min_trades: 1,
            max_drawdown_pct: 100.0,
            min_profit_factor: 0.0,
        }
    }

    /// NaN profit factor (no losing trades) never passes.
    pub fn accepts(&self, stats: &Statistics) -> bool {
        stats.trades >= self.min_trades
            && (stats.max_drawdown * 100.0).abs() <= self.max_drawdown_pct
            && !stats.profit_factor.is_nan()
            && stats.profit_factor >= self.min_profit_factor
    }
}

/// Outcome of a sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSummary {
    pub leaderboard: Leaderboard,
    /// Combinations backtested.
    pub evaluated: usize,
    /// Combinations skipped because `rsi_buy >= rsi_sell`.
    pub degenerate_skipped: usize,
    /// Combinations that ran but failed the criteria.
    pub rejected: usize,
}

/// Train leaderboard plus the out-of-sample result of its best row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainTestReport {
    pub split: NaiveDate,
    pub train_bars: usize,
    pub test_bars: usize,
    pub train: SweepSummary,
    pub test: Option<LeaderboardRow>,
}

/// Runs a `SweepGrid` against one bar history.
#[derive(Debug, Clone)]
pub struct Sweep {
    pub base_signal: RsiThreshold,
    pub base_engine: EngineConfig,
    pub criteria: SweepCriteria,
    pub sort_key: SortKey,
    parallel: bool,
}

impl Sweep {
    pub fn new(base_signal: RsiThreshold, base_engine: EngineConfig) -> Self {
        Self {
            base_signal,
            base_engine,
            criteria: SweepCriteria::default(),
            sort_key: SortKey::default(),
            parallel: true,
        }
    }

    pub fn with_criteria(mut self, criteria: SweepCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn with_sort_key(mut self, sort_key: SortKey) -> Self {
        self.sort_key = sort_key;
        self
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    fn signal_for(&self, params: &SweepParams) -> Result<RsiThreshold, SignalConfigError> {
        let signal = self
            .base_signal
            .clone()
            .with_thresholds(params.rsi_buy, params.rsi_sell);
        signal.validate()?;
        Ok(signal)
    }

    fn engine_for(&self, params: &SweepParams) -> EngineConfig {
        let mut engine = self.base_engine.clone();
        engine.stop_loss_pct = params.stop_loss_pct;
        engine.take_profit_pct = params.take_profit_pct;
        engine.trailing_stop_pct = params.trailing_stop_pct;
        engine.time_stop_bars = params.time_stop_bars;
        engine
    }

    /// Backtest a single parameter set.
    pub fn evaluate(&self, bars: &[Bar], params: &SweepParams) -> Result<Statistics, SweepError> {
        let series = self.signal_for(params)?.generate(bars);
        Ok(run_backtest(&series, &self.engine_for(params))?.stats)
    }

    pub fn run(&self, bars: &[Bar], grid: &SweepGrid) -> Result<SweepSummary, SweepError> {
        self.run_with_progress(bars, grid, |_, _| {})
    }

    /// Like `run`, calling `progress(done, total)` after each backtest.
    pub fn run_with_progress<F>(
        &self,
        bars: &[Bar],
        grid: &SweepGrid,
        progress: F,
    ) -> Result<SweepSummary, SweepError>
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        let combos = grid.combinations();
        let degenerate_skipped = grid.degenerate_count();
        if degenerate_skipped > 0 {
            tracing::warn!(
                skipped = degenerate_skipped,
                "skipping combinations with rsi_buy >= rsi_sell"
            );
        }

        let series = self.signal_cache(bars, &combos)?;
        let total = combos.len();
        let done = AtomicUsize::new(0);

        let eval = |params: &SweepParams| -> Result<(SweepParams, Statistics), SweepError> {
            let key = threshold_key(params);
            let stats = match series.get(&key) {
                Some(s) => run_backtest(s, &self.engine_for(params))?.stats,
                None => self.evaluate(bars, params)?,
            };
            progress(done.fetch_add(1, Ordering::Relaxed) + 1, total);
            Ok((*params, stats))
        };

        let results: Vec<(SweepParams, Statistics)> = if self.parallel {
            combos.par_iter().map(eval).collect::<Result<_, _>>()?
        } else {
            combos.iter().map(eval).collect::<Result<_, _>>()?
        };

        let evaluated = results.len();
        let rows: Vec<LeaderboardRow> = results
            .iter()
            .filter(|(_, stats)| self.criteria.accepts(stats))
            .map(|(params, stats)| LeaderboardRow::from_stats(*params, stats))
            .collect();
        let rejected = evaluated - rows.len();

        tracing::info!(evaluated, accepted = rows.len(), rejected, "sweep complete");

        Ok(SweepSummary {
            leaderboard: Leaderboard::new(rows, self.sort_key),
            evaluated,
            degenerate_skipped,
            rejected,
        })
    }

    /// One signal series per distinct threshold pair.
    fn signal_cache(
        &self,
        bars: &[Bar],
        combos: &[SweepParams],
    ) -> Result<HashMap<(u64, u64), SignalSeries>, SweepError> {
        let mut pairs: Vec<SweepParams> = Vec::new();
        for p in combos {
            if !pairs.iter().any(|q| threshold_key(q) == threshold_key(p)) {
                pairs.push(*p);
            }
        }
        let build = |p: &SweepParams| -> Result<((u64, u64), SignalSeries), SweepError> {
            Ok((threshold_key(p), self.signal_for(p)?.generate(bars)))
        };
        let cache = if self.parallel {
            pairs.par_iter().map(build).collect::<Result<_, _>>()?
        } else {
            pairs.iter().map(build).collect::<Result<_, _>>()?
        };
        Ok(cache)
    }

    /// Optimize on bars before `split`, then replay the best row on the rest.
    pub fn train_test(
        &self,
        bars: &[Bar],
        split: NaiveDate,
        grid: &SweepGrid,
    ) -> Result<TrainTestReport, SweepError> {
        let (train, test) = split_at(bars, split);
        if train.len() < MIN_SPLIT_BARS || test.len() < MIN_SPLIT_BARS {
            return Err(SweepError::InsufficientData {
                train: train.len(),
                test: test.len(),
                min: MIN_SPLIT_BARS,
            });
        }

        let summary = self.run(train, grid)?;
        let test_row = match summary.leaderboard.best() {
            Some(best) => {
                let stats = self.evaluate(test, &best.params)?;
                Some(LeaderboardRow::from_stats(best.params, &stats))
            }
            None => {
                tracing::warn!("no combination passed the criteria on the train split");
                None
            }
        };

        Ok(TrainTestReport {
            split,
            train_bars: train.len(),
            test_bars: test.len(),
            train: summary,
            test: test_row,
        })
    }
}

fn threshold_key(p: &SweepParams) -> (u64, u64) {
    (p.rsi_buy.to_bits(), p.rsi_sell.to_bits())
}

/// Bars dated before `date`, and the rest.
pub fn split_at(bars: &[Bar], date: NaiveDate) -> (&[Bar], &[Bar]) {
    let idx = bars.partition_point(|b| b.timestamp.date() < date);
    bars.split_at(idx)
}
