//! Artifact export tests: exact JSON reload, CSV tapes, Markdown report, bundle.

use chrono::NaiveDate;
use tradebot_core::data::{synthetic, DataSource};
use tradebot_core::signals::{RsiThreshold, StrategyConfig};
use tradebot_runner::config::BacktestConfig;
use tradebot_runner::export::{
    export_equity_csv, export_json, export_trades_csv, generate_report, import_json,
    load_artifacts, save_artifacts, save_leaderboard,
};
use tradebot_runner::leaderboard::{Leaderboard, SortKey, CSV_COLUMNS};
use tradebot_runner::runner::{run_backtest_from_bars, BacktestResult, SCHEMA_VERSION};

fn result() -> BacktestResult {
    let mut cfg = BacktestConfig::for_symbol("ERIC-B.ST");
    cfg.strategy = StrategyConfig::RsiThreshold(RsiThreshold {
        use_trend: false,
        ..RsiThreshold::default()
    });
    cfg.engine.stop_loss_pct = 5.0;
    let bars = synthetic::generate(
        "ERIC-B.ST",
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2022, 12, 31).unwrap(),
    );
    run_backtest_from_bars(&cfg, &bars, DataSource::Synthetic).unwrap()
}

#[test]
fn json_round_trip() {
    let r = result();
    let back = import_json(&export_json(&r).unwrap()).unwrap();
    assert_eq!(back.run_id, r.run_id);
    assert_eq!(back.trades, r.trades);
    assert_eq!(back.equity_curve, r.equity_curve);
    assert_eq!(back.config, r.config);
}

#[test]
fn json_reload_is_bit_exact() {
    let mut r = result();
    assert!(!r.trades.is_empty());
    r.trades[0].entry_trigger = 97.84005923166792;
    r.trades[0].net_return = -0.05000000000000005;
    r.equity_curve[1] = 0.9499999999999999;

    let back = import_json(&export_json(&r).unwrap()).unwrap();
    assert_eq!(back.trades[0].entry_trigger.to_bits(), 97.84005923166792f64.to_bits());
    assert_eq!(back.trades[0].net_return.to_bits(), (-0.05000000000000005f64).to_bits());
    assert_eq!(back.equity_curve[1].to_bits(), 0.9499999999999999f64.to_bits());
}

#[test]
fn newer_schema_rejected() {
    let mut r = result();
    r.schema_version = SCHEMA_VERSION + 1;
    let json = export_json(&r).unwrap();
    let err = import_json(&json).unwrap_err();
    assert!(err.to_string().contains("unsupported schema version"));
}

#[test]
fn missing_schema_version_defaults() {
    let r = result();
    let mut value: serde_json::Value = serde_json::from_str(&export_json(&r).unwrap()).unwrap();
    value.as_object_mut().unwrap().remove("schema_version");
    let back = import_json(&value.to_string()).unwrap();
    assert_eq!(back.schema_version, SCHEMA_VERSION);
}

#[test]
fn csv_tapes_have_one_row_per_item() {
    let r = result();
    let trades = export_trades_csv(&r.trades).unwrap();
    assert_eq!(trades.lines().count(), r.trades.len() + 1);
    assert!(trades.starts_with("entry_bar,entry_time,entry_price"));

    let equity = export_equity_csv(&r.equity_curve).unwrap();
    assert_eq!(equity.lines().count(), r.bar_count + 2);
    assert_eq!(equity.lines().nth(1).unwrap(), "0,1.000000");
}

#[test]
fn report_mentions_key_figures() {
    let r = result();
    let md = generate_report(&r);
    assert!(md.starts_with("# Backtest Report"));
    assert!(md.contains("| Symbol | ERIC-B.ST |"));
    assert!(md.contains("| Strategy | rsi_threshold |"));
    assert!(md.contains("| Stop loss | 5% |"));
    assert!(md.contains("**SYNTHETIC**"));
    assert!(md.contains(&format!("| Trades | {} |", r.stats.trades)));
}

#[test]
fn artifact_bundle_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let r = result();
    let run_dir = save_artifacts(&r, dir.path()).unwrap();

    let name = run_dir.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("ERIC-B.ST_"));
    for file in ["manifest.json", "trades.csv", "equity.csv", "report.md"] {
        assert!(run_dir.join(file).is_file(), "{file} missing");
    }
    assert_eq!(load_artifacts(&run_dir).unwrap().run_id, r.run_id);
}

#[test]
fn leaderboard_file_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("leaderboard.csv");
    save_leaderboard(&Leaderboard::new(Vec::new(), SortKey::Cagr), &path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.trim_end(), CSV_COLUMNS.join(","));
}
