//! Criterion benchmarks for the parameter sweep.
//!
//! Run with: `cargo bench -p tradebot-runner`
//!
//! - Grid expansion and range parsing
//! - Full sweep, sequential versus rayon

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use chrono::NaiveDate;
use tradebot_core::data::synthetic;
use tradebot_core::engine::EngineConfig;
use tradebot_core::signals::RsiThreshold;
use tradebot_runner::optimize::{parse_float_range, Sweep, SweepCriteria, SweepGrid};

fn grid() -> SweepGrid {
    SweepGrid {
        rsi_buy: vec![44.0, 46.0, 48.0, 50.0],
        rsi_sell: vec![55.0, 58.0, 61.0],
        stop_loss_pct: vec![0.0, 5.0, 8.0],
        trailing_stop_pct: vec![0.0, 10.0],
        ..SweepGrid::default()
    }
}

fn bench_grid(c: &mut Criterion) {
    c.bench_function("parse_float_range_0_10_0.1", |b| {
        b.iter(|| parse_float_range(black_box("0:10:0.1")))
    });
    let g = grid();
    c.bench_function("grid_combinations", |b| b.iter(|| black_box(&g).combinations()));
}

fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep");
    group.sample_size(10);
    let bars = synthetic::generate(
        "BENCH",
        NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
    );
    let base = RsiThreshold {
        use_trend: false,
        ..RsiThreshold::default()
    };
    let g = grid();

    for parallel in [false, true] {
        let sweep = Sweep::new(base.clone(), EngineConfig::default().with_costs(0.0005, 5))
            .with_criteria(SweepCriteria::permissive())
            .with_parallelism(parallel);
        let label = if parallel { "rayon" } else { "sequential" };
        group.bench_with_input(BenchmarkId::new(label, g.size()), &bars, |b, bars| {
            b.iter(|| sweep.run(black_box(bars), &g))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_grid, bench_sweep);
criterion_main!(benches);
