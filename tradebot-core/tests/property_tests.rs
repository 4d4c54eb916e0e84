//! Property tests for engine invariants.
//!
//! Uses proptest to verify, over random price paths and random flags:
//! 1. Equity curve length: always bars + 1
//! 2. Single position: trades never overlap and are time-ordered
//! 3. Flat at end: a position open on the last bar closes there as EOD
//! 4. Frictionless identity: net return equals exit/entry trigger − 1
//! 5. Equity modes agree on final equity without frictions

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use tradebot_core::domain::{Bar, ExitReason, SignalBar, SignalSeries};
use tradebot_core::engine::{run_backtest, EngineConfig, EquityMode, ExecutionTiming};

// ── Strategies (proptest) ────────────────────────────────────────────

/// A random walk of 2..120 bars with consistent OHLC and random flags.
fn arb_series() -> impl Strategy<Value = SignalSeries> {
    prop::collection::vec(
        (
            -0.05..0.05_f64,
            0.0..0.03_f64,
            0.0..0.03_f64,
            any::<bool>(),
            any::<bool>(),
        ),
        2..120,
    )
    .prop_map(|steps| {
        let t0 = NaiveDate::from_ymd_opt(2022, 1, 3)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut price = 100.0_f64;
        steps
            .into_iter()
            .enumerate()
            .map(|(i, (ret, up, down, buy, sell))| {
                let open = price;
                let close = price * (1.0 + ret);
                let high = open.max(close) * (1.0 + up);
                let low = open.min(close) * (1.0 - down);
                price = close;
                let bar = Bar::new(t0 + Duration::days(i as i64), open, high, low, close, 1.0);
                SignalBar::with_flags(bar, buy, sell)
            })
            .collect::<Vec<_>>()
    })
    .prop_map(|bars| SignalSeries::new("prop", bars))
}

fn arb_config() -> impl Strategy<Value = EngineConfig> {
    (
        prop_oneof![Just(0.0), 1.0..15.0_f64],
        prop_oneof![Just(0.0), 1.0..25.0_f64],
        prop_oneof![Just(0.0), 1.0..15.0_f64],
        0usize..10,
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(sl, tp, trail, tstop, next_open, mtm)| {
            let mut cfg = EngineConfig::default()
                .with_stop_loss(sl)
                .with_take_profit(tp)
                .with_trailing_stop(trail)
                .with_time_stop(tstop);
            cfg.fractional_units = true;
            if next_open {
                cfg = cfg.with_timing(ExecutionTiming::NextBarOpen);
            }
            if mtm {
                cfg = cfg.with_equity_mode(EquityMode::MarkToMarket);
            }
            cfg
        })
}

proptest! {
    #[test]
    fn equity_curve_has_one_point_per_bar_plus_start(
        series in arb_series(),
        cfg in arb_config(),
    ) {
        let out = run_backtest(&series, &cfg).unwrap();
        prop_assert_eq!(out.equity_curve.len(), series.len() + 1);
        prop_assert_eq!(out.in_position.len(), series.len());
        prop_assert_eq!(out.equity_curve[0], 1.0);
        prop_assert!(out.equity_curve.iter().all(|e| e.is_finite() && *e > 0.0));
    }

    #[test]
    fn trades_never_overlap(series in arb_series(), cfg in arb_config()) {
        let out = run_backtest(&series, &cfg).unwrap();
        for t in &out.trades {
            prop_assert!(t.entry_timestamp < t.exit_timestamp);
            prop_assert!(t.entry_bar < t.exit_bar);
        }
        for pair in out.trades.windows(2) {
            prop_assert!(pair[0].exit_timestamp < pair[1].entry_timestamp);
        }
    }

    #[test]
    fn flat_at_end(series in arb_series(), cfg in arb_config()) {
        let out = run_backtest(&series, &cfg).unwrap();
        prop_assert_eq!(out.in_position.last(), Some(&false));
        let last = series.len() - 1;
        if let Some(t) = out.trades.iter().find(|t| t.exit_reason == ExitReason::Eod) {
            prop_assert_eq!(t.exit_bar, last);
            prop_assert_eq!(t.exit_trigger, series.bars[last].bar.close);
        }
    }

    #[test]
    fn frictionless_return_is_trigger_ratio(series in arb_series(), cfg in arb_config()) {
        let out = run_backtest(&series, &cfg).unwrap();
        for t in &out.trades {
            prop_assert!((t.net_return - (t.exit_trigger / t.entry_trigger - 1.0)).abs() < 1e-12);
        }
    }

    #[test]
    fn equity_modes_agree_without_frictions(series in arb_series(), cfg in arb_config()) {
        let realized = run_backtest(&series, &cfg.clone().with_equity_mode(EquityMode::RealizedOnly)).unwrap();
        let mtm = run_backtest(&series, &cfg.with_equity_mode(EquityMode::MarkToMarket)).unwrap();
        let a = realized.stats.final_equity;
        let b = mtm.stats.final_equity;
        prop_assert!((a - b).abs() <= 1e-9 * a.max(b), "realized={} mtm={}", a, b);
    }

    #[test]
    fn drawdown_is_non_positive(series in arb_series(), cfg in arb_config()) {
        let out = run_backtest(&series, &cfg).unwrap();
        prop_assert!(out.stats.max_drawdown <= 0.0);
        prop_assert!(out.stats.max_drawdown >= -1.0);
    }
}
