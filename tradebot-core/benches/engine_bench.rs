//! Criterion benchmarks for TradeBot hot paths.
//!
//! Benchmarks:
//! 1. Bar loop (full backtest over a prebuilt signal series)
//! 2. Signal generation (indicators plus flag logic)
//! 3. Indicator compute (SMA, EMA, RSI, ATR, MACD)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use tradebot_core::domain::Bar;
use tradebot_core::engine::{run_backtest, EngineConfig, EquityMode, ExecutionTiming};
use tradebot_core::indicators::{Atr, Ema, Indicator, Macd, Rsi, Sma};
use tradebot_core::signals::{MacdRsi, MacdTrend, RsiThreshold, SignalGenerator};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(n: usize) -> Vec<Bar> {
    let base = chrono::NaiveDate::from_ymd_opt(2020, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0 + i as f64 * 0.01;
            Bar::new(
                base + chrono::Duration::days(i as i64),
                close - 0.3,
                close + 1.5,
                close - 1.5,
                close,
                1_000_000.0,
            )
        })
        .collect()
}

// ── 1. Bar loop ──────────────────────────────────────────────────────

fn bench_bar_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("bar_loop");
    let signal = RsiThreshold {
        use_trend: false,
        ..RsiThreshold::default()
    };

    for n in [252usize, 1260, 5040] {
        let series = signal.generate(&make_bars(n));
        let config = EngineConfig::default()
            .with_stop_loss(8.0)
            .with_trailing_stop(12.0)
            .with_costs(0.001, 5);
        group.bench_with_input(BenchmarkId::new("same_bar_close", n), &series, |b, s| {
            b.iter(|| run_backtest(black_box(s), black_box(&config)))
        });

        let nbo = config
            .clone()
            .with_timing(ExecutionTiming::NextBarOpen)
            .with_equity_mode(EquityMode::MarkToMarket);
        group.bench_with_input(BenchmarkId::new("next_open_mtm", n), &series, |b, s| {
            b.iter(|| run_backtest(black_box(s), black_box(&nbo)))
        });
    }
    group.finish();
}

// ── 2. Signals ───────────────────────────────────────────────────────

fn bench_signals(c: &mut Criterion) {
    let mut group = c.benchmark_group("signal_generation");
    let bars = make_bars(1260);
    let generators: Vec<Box<dyn SignalGenerator>> = vec![
        Box::new(RsiThreshold::default()),
        Box::new(MacdRsi::default()),
        Box::new(MacdTrend::strict()),
    ];
    for sig in &generators {
        group.bench_function(sig.name(), |b| b.iter(|| sig.generate(black_box(&bars))));
    }
    group.finish();
}

// ── 3. Indicators ────────────────────────────────────────────────────

fn bench_indicators(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicator_compute");
    let bars = make_bars(5040);
    let indicators: Vec<Box<dyn Indicator>> = vec![
        Box::new(Sma::new(200)),
        Box::new(Ema::new(26)),
        Box::new(Rsi::wilder(14)),
        Box::new(Rsi::simple(14)),
        Box::new(Atr::new(14)),
    ];
    for ind in &indicators {
        group.bench_function(ind.name(), |b| b.iter(|| ind.compute(black_box(&bars))));
    }
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    group.bench_function("macd_12_26_9", |b| {
        b.iter(|| Macd::default().compute_lines(black_box(&closes)))
    });
    group.finish();
}

criterion_group!(benches, bench_bar_loop, bench_signals, bench_indicators);
criterion_main!(benches);
