//! Bar loop: walks a signal series once and produces the ledger.
//!
//! Per bar, in order:
//! 1. Start of bar: fill anything decided on the previous bar at this open
//!    (next-bar-open timing only).
//! 2. Exits: advance the open position with this bar, then resolve exits.
//!    Intrabar exits fill now. Close exits fill now, or are scheduled for the
//!    next open.
//! 3. Entries: a BUY while flat enters at this close, or is scheduled for the
//!    next open.
//! 4. End of bar: force an EOD close on the final bar, mark equity, record
//!    exposure.
//!
//! Exits are only evaluated on bars after the entry bar, and no entry fills
//! on a bar that already had an exit, so trades never share a timestamp.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::config::{EngineConfig, ExecutionTiming};
use super::cost::{CostModel, FillSide};
use super::equity::EquityTracker;
use super::error::EngineError;
use super::exit::{resolve, ExitPoint, ExitRules};
use super::state::{entry_quantity, PositionState};
use super::stats::Statistics;
use crate::domain::{ExitReason, SignalSeries, Trade};

/// Everything a run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestOutcome {
    pub trades: Vec<Trade>,
    /// One point per bar plus the initial 1.0.
    pub equity_curve: Vec<f64>,
    /// Whether a position was open at the end of each bar.
    pub in_position: Vec<bool>,
    pub stats: Statistics,
}

/// An order decided on one bar and filled at the next bar's open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingOrder {
    Entry,
    Exit(ExitReason),
}

/// Reject series the engine cannot interpret.
pub fn validate_series(series: &SignalSeries) -> Result<(), EngineError> {
    if series.is_empty() {
        return Err(EngineError::EmptySeries);
    }
    let mut previous: Option<NaiveDateTime> = None;
    for (index, sb) in series.bars.iter().enumerate() {
        let bar = &sb.bar;
        if let Some(field) = bar.invalid_price() {
            return Err(EngineError::InvalidPrice {
                index,
                field,
                value: bar.price(field),
            });
        }
        if bar.high < bar.low {
            return Err(EngineError::InvertedRange {
                index,
                high: bar.high,
                low: bar.low,
            });
        }
        if let Some(prev) = previous {
            if bar.timestamp <= prev {
                return Err(EngineError::NonMonotonicTimestamp {
                    index,
                    previous: prev,
                    current: bar.timestamp,
                });
            }
        }
        previous = Some(bar.timestamp);
    }
    Ok(())
}

/// Mutable loop state for one run.
struct Run<'a> {
    config: &'a EngineConfig,
    cost: CostModel,
    position: PositionState,
    equity: EquityTracker,
    trades: Vec<Trade>,
    last_exit_bar: Option<usize>,
}

impl Run<'_> {
    fn enter(&mut self, index: usize, timestamp: NaiveDateTime, trigger: f64) {
        if self.last_exit_bar == Some(index) {
            return;
        }
        let fill = self.cost.fill(trigger, FillSide::Entry);
        let capital = self.config.capital * self.equity.realized_equity();
        let quantity = entry_quantity(capital, fill, self.config.fractional_units);
        if !self
            .position
            .enter(index, timestamp, trigger, quantity, &self.cost)
        {
            tracing::debug!(bar = index, price = trigger, "entry suppressed: quantity rounds to zero");
            return;
        }
        self.equity.on_entry(trigger);
        tracing::debug!(bar = index, price = fill, quantity, "entry filled");
    }

    fn close(&mut self, index: usize, timestamp: NaiveDateTime, trigger: f64, reason: ExitReason) {
        let Some(trade) = self
            .position
            .exit(index, timestamp, trigger, reason, &self.cost)
        else {
            return;
        };
        self.equity.on_exit(trigger, trade.net_return);
        self.last_exit_bar = Some(index);
        tracing::debug!(
            bar = index,
            reason = %reason,
            price = trade.exit_price,
            net_return = trade.net_return,
            "exit filled"
        );
        self.trades.push(trade);
    }
}

/// Run a backtest over `series` with `config`.
///
/// Pure: no I/O, no shared state. The same inputs always give the same outcome.
pub fn run_backtest(
    series: &SignalSeries,
    config: &EngineConfig,
) -> Result<BacktestOutcome, EngineError> {
    config.validate()?;
    validate_series(series)?;

    let bars = &series.bars;
    let n = bars.len();
    let cost = CostModel::from_config(config);
    let rules = ExitRules::from_config(config);
    let timing = config.execution_timing;

    tracing::info!(
        bars = n,
        source = %series.source,
        timing = %timing,
        equity_mode = %config.equity_mode,
        "starting backtest"
    );

    let mut run = Run {
        config,
        cost,
        position: PositionState::Flat,
        equity: EquityTracker::new(config.equity_mode, &cost, n),
        trades: Vec::new(),
        last_exit_bar: None,
    };
    let mut in_position = Vec::with_capacity(n);
    let mut pending: Option<PendingOrder> = None;

    for (i, sb) in bars.iter().enumerate() {
        let bar = &sb.bar;
        let is_last = i + 1 == n;

        // ── Start of bar ──
        match pending.take() {
            Some(PendingOrder::Entry) => run.enter(i, bar.timestamp, bar.open),
            Some(PendingOrder::Exit(reason)) => run.close(i, bar.timestamp, bar.open, reason),
            None => {}
        }

        // ── Exits ──
        let decision = match run.position.position_mut() {
            Some(pos) if pos.entry_bar_index < i => {
                pos.advance(bar.close);
                resolve(pos, sb, &rules)
            }
            _ => None,
        };
        if let Some(d) = decision {
            match (d.point, timing) {
                (ExitPoint::Close, ExecutionTiming::NextBarOpen) => {
                    // On the final bar there is no next open; EOD closes below.
                    if !is_last {
                        pending = Some(PendingOrder::Exit(d.reason));
                    }
                }
                _ => run.close(i, bar.timestamp, d.trigger_price, d.reason),
            }
        }

        // ── Entries ──
        // An entry filling on the final bar could never be held across a bar.
        if sb.buy && !run.position.is_long() && pending.is_none() {
            match timing {
                ExecutionTiming::SameBarClose if !is_last => {
                    run.enter(i, bar.timestamp, bar.close);
                }
                ExecutionTiming::NextBarOpen if i + 2 < n => {
                    pending = Some(PendingOrder::Entry);
                }
                _ => {}
            }
        }

        // ── End of bar ──
        if is_last && run.position.is_long() {
            run.close(i, bar.timestamp, bar.close, ExitReason::Eod);
        }
        run.equity.end_bar(bar.close);
        in_position.push(run.position.is_long());
    }

    let Run { trades, equity, .. } = run;
    let equity_curve = equity.into_curve();
    let first = bars[0].bar.timestamp;
    let last = bars[n - 1].bar.timestamp;
    let stats = Statistics::compute(&trades, &equity_curve, &in_position, first, last);

    tracing::info!(
        trades = stats.trades,
        final_equity = stats.final_equity,
        max_drawdown = stats.max_drawdown,
        "backtest finished"
    );

    Ok(BacktestOutcome {
        trades,
        equity_curve,
        in_position,
        stats,
    })
}
