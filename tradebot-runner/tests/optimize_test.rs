//! Parameter sweep integration tests.
//!
//! Tests:
//! 1. Parallel and sequential sweeps agree
//! 2. Every combination is accounted for (accepted, rejected or degenerate)
//! 3. Leaderboard rows match a direct backtest of their parameters
//! 4. Progress callback fires once per combination
//! 5. Train/test split and its minimum-size guard
//! 6. Range parsing properties

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;
use proptest::prelude::*;
use tradebot_core::data::synthetic;
use tradebot_core::domain::Bar;
use tradebot_core::engine::EngineConfig;
use tradebot_core::signals::RsiThreshold;
use tradebot_runner::leaderboard::{LeaderboardRow, SortKey};
use tradebot_runner::optimize::{
    parse_float_range, split_at, Sweep, SweepCriteria, SweepError, SweepGrid,
};

fn bars() -> Vec<Bar> {
    synthetic::generate(
        "SWEEP",
        NaiveDate::from_ymd_opt(2016, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2021, 12, 31).unwrap(),
    )
}

fn sweep() -> Sweep {
    let base = RsiThreshold {
        use_trend: false,
        ..RsiThreshold::default()
    };
    Sweep::new(base, EngineConfig::default().with_costs(0.0005, 5))
        .with_criteria(SweepCriteria::permissive())
}

fn grid() -> SweepGrid {
    SweepGrid {
        rsi_buy: vec![40.0, 45.0, 50.0],
        rsi_sell: vec![45.0, 55.0, 60.0],
        stop_loss_pct: vec![0.0, 5.0],
        trailing_stop_pct: vec![0.0, 8.0],
        ..SweepGrid::default()
    }
}

#[test]
fn parallel_matches_sequential() {
    let bars = bars();
    let par = sweep().run(&bars, &grid()).unwrap();
    let seq = sweep().with_parallelism(false).run(&bars, &grid()).unwrap();
    assert_eq!(par.leaderboard, seq.leaderboard);
    assert_eq!(par.evaluated, seq.evaluated);
}

#[test]
fn every_combination_accounted_for() {
    let bars = bars();
    let g = grid();
    let summary = sweep().run(&bars, &g).unwrap();
    assert_eq!(summary.evaluated, g.combinations().len());
    assert_eq!(summary.degenerate_skipped, g.degenerate_count());
    assert_eq!(summary.evaluated + summary.degenerate_skipped, g.size());
    assert_eq!(summary.leaderboard.len() + summary.rejected, summary.evaluated);
}

#[test]
fn rows_sorted_and_reproducible() {
    let bars = bars();
    let s = sweep().with_sort_key(SortKey::TotalReturn);
    let summary = s.run(&bars, &grid()).unwrap();
    let rows = &summary.leaderboard.rows;
    assert!(!rows.is_empty());
    for w in rows.windows(2) {
        assert!(w[0].total_return_pct >= w[1].total_return_pct);
    }
    for row in rows.iter().take(3) {
        let stats = s.evaluate(&bars, &row.params).unwrap();
        assert_eq!(LeaderboardRow::from_stats(row.params, &stats), *row);
    }
}

#[test]
fn strict_criteria_reject_more() {
    let bars = bars();
    let loose = sweep().run(&bars, &grid()).unwrap();
    let strict = sweep()
        .with_criteria(SweepCriteria {
            min_trades: 10_000,
            ..SweepCriteria::default()
        })
        .run(&bars, &grid())
        .unwrap();
    assert!(strict.leaderboard.is_empty());
    assert_eq!(strict.rejected, loose.evaluated);
}

#[test]
fn progress_reports_each_combination() {
    let bars = bars();
    let g = grid();
    let calls = AtomicUsize::new(0);
    let max_done = AtomicUsize::new(0);
    sweep()
        .run_with_progress(&bars, &g, |done, total| {
            assert_eq!(total, g.combinations().len());
            calls.fetch_add(1, Ordering::SeqCst);
            max_done.fetch_max(done, Ordering::SeqCst);
        })
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), g.combinations().len());
    assert_eq!(max_done.load(Ordering::SeqCst), g.combinations().len());
}

#[test]
fn train_test_splits_by_date() {
    let bars = bars();
    let split = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let report = sweep().train_test(&bars, split, &grid()).unwrap();
    assert_eq!(report.train_bars + report.test_bars, bars.len());

    let (train, test) = split_at(&bars, split);
    assert!(train.iter().all(|b| b.timestamp.date() < split));
    assert!(test.iter().all(|b| b.timestamp.date() >= split));

    let best = report.train.leaderboard.best().unwrap();
    let test_row = report.test.unwrap();
    assert_eq!(test_row.params, best.params);
}

#[test]
fn train_test_needs_bars_on_both_sides() {
    let bars = bars();
    let early = NaiveDate::from_ymd_opt(2016, 1, 20).unwrap();
    let err = sweep().train_test(&bars, early, &grid()).unwrap_err();
    assert!(matches!(err, SweepError::InsufficientData { min: 50, .. }));

    let late = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
    assert!(sweep().train_test(&bars, late, &grid()).is_err());
}

proptest! {
    #[test]
    fn float_range_stays_within_bounds(
        start in 0u32..100,
        width in 0u32..50,
        step_tenths in 1u32..30,
    ) {
        let (a, b, s) = (start as f64, (start + width) as f64, step_tenths as f64 / 10.0);
        let values = parse_float_range(&format!("{a}:{b}:{s}")).unwrap();
        prop_assert_eq!(values[0], a);
        prop_assert!(values.iter().all(|v| *v >= a && *v <= b + 1e-9));
        prop_assert!(values.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(*values.last().unwrap() + s > b - 1e-9);
    }
}
