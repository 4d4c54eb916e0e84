//! Reporting and export: JSON, CSV, and Markdown artifacts.
//!
//! - **JSON**: full round-trip of a `BacktestResult` with schema versioning
//! - **CSV**: trade tape, equity curve, and sweep leaderboard
//! - **Markdown**: human-readable single-run report
//!
//! Results from a newer schema version are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tradebot_core::domain::{ExitReason, Trade};

use crate::leaderboard::Leaderboard;
use crate::runner::{BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult`, rejecting schema versions newer than ours.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Trade tape. Returns are written in percent.
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "entry_bar",
        "entry_time",
        "entry_price",
        "exit_bar",
        "exit_time",
        "exit_price",
        "exit_reason",
        "quantity",
        "bars_held",
        "net_return_pct",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.entry_bar.to_string(),
            &t.entry_timestamp.to_string(),
            &format!("{:.6}", t.entry_price),
            &t.exit_bar.to_string(),
            &t.exit_timestamp.to_string(),
            &format!("{:.6}", t.exit_price),
            &t.exit_reason.as_str().to_string(),
            &format!("{:.6}", t.quantity),
            &t.bars_held.to_string(),
            &format!("{:.4}", t.net_return * 100.0),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Equity curve as `bar_index,equity`. Index 0 is the starting point.
pub fn export_equity_csv(equity_curve: &[f64]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["bar_index", "equity"])?;
    for (i, eq) in equity_curve.iter().enumerate() {
        wtr.write_record([&i.to_string(), &format!("{:.6}", eq)])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Write the leaderboard CSV to `path`, creating parent directories.
pub fn save_leaderboard(leaderboard: &Leaderboard, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let csv = leaderboard
        .to_csv()
        .context("failed to render leaderboard CSV")?;
    std::fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single backtest run.
///
/// Creates `{symbol}_{timestamp}/` under `output_dir` containing
/// `manifest.json`, `trades.csv`, `equity.csv` and `report.md`.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!(
        "{}_{}",
        sanitize(&result.symbol),
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("manifest.json"), export_json(result)?)?;
    std::fs::write(run_dir.join("trades.csv"), export_trades_csv(&result.trades)?)?;
    std::fs::write(
        run_dir.join("equity.csv"),
        export_equity_csv(&result.equity_curve)?,
    )?;
    std::fs::write(run_dir.join("report.md"), generate_report(result))?;

    tracing::info!(dir = %run_dir.display(), "artifacts saved");
    Ok(run_dir)
}

/// Keep symbols like `ERIC-B.ST` intact, replace path separators.
fn sanitize(symbol: &str) -> String {
    symbol
        .chars()
        .map(|c| if c == '/' || c == '\\' || c == ':' { '_' } else { c })
        .collect()
}

/// Load a `BacktestResult` from an artifact directory's manifest.json.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

// ─── Markdown report ────────────────────────────────────────────────

pub fn generate_report(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(2048);

    md.push_str("# Backtest Report\n\n");

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Symbol | {} |\n", result.symbol));
    md.push_str(&format!("| Strategy | {} |\n", result.strategy));
    md.push_str(&format!(
        "| Period | {} to {} |\n",
        result.start_date, result.end_date
    ));
    md.push_str(&format!(
        "| Bars | {} ({} warmup) |\n",
        result.bar_count, result.warmup_bars
    ));
    md.push_str(&format!("| BUY signals | {} |\n", result.signal_count));
    md.push_str(&format!("| Data source | {} |\n", result.data_source));
    md.push_str(&format!("| Run ID | `{}` |\n", result.run_id));
    if result.has_synthetic {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    md.push('\n');

    let e = &result.config.engine;
    md.push_str("## Engine\n\n");
    md.push_str("| Setting | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Stop loss | {} |\n", pct_or_off(e.stop_loss_pct)));
    md.push_str(&format!("| Take profit | {} |\n", pct_or_off(e.take_profit_pct)));
    md.push_str(&format!(
        "| Trailing stop | {} |\n",
        pct_or_off(e.trailing_stop_pct)
    ));
    if e.chandelier_atr_mult > 0.0 {
        md.push_str(&format!("| Chandelier | {}× ATR |\n", e.chandelier_atr_mult));
    }
    if e.time_stop_bars > 0 {
        md.push_str(&format!("| Time stop | {} bars |\n", e.time_stop_bars));
    }
    md.push_str(&format!(
        "| Costs | fee {:.3}% per side, slippage {} bps |\n",
        e.fee_fraction * 100.0,
        e.slippage_bps
    ));
    md.push_str(&format!("| Timing | {:?} |\n", e.execution_timing));
    md.push('\n');

    let s = &result.stats;
    md.push_str("## Performance Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Total Return | {:.2}% |\n", s.total_return * 100.0));
    md.push_str(&format!("| CAGR | {:.2}% |\n", s.cagr * 100.0));
    md.push_str(&format!("| Max Drawdown | {:.2}% |\n", s.max_drawdown * 100.0));
    md.push_str(&format!("| Trades | {} |\n", s.trades));
    md.push_str(&format!("| Win Rate | {:.1}% |\n", s.win_rate * 100.0));
    if s.profit_factor.is_nan() {
        md.push_str("| Profit Factor | n/a |\n");
    } else {
        md.push_str(&format!("| Profit Factor | {:.2} |\n", s.profit_factor));
    }
    md.push_str(&format!("| Expectancy | {:.2}% |\n", s.expectancy * 100.0));
    md.push_str(&format!("| Avg Win | {:.2}% |\n", s.avg_win * 100.0));
    md.push_str(&format!("| Avg Loss | {:.2}% |\n", s.avg_loss * 100.0));
    md.push_str(&format!("| Exposure | {:.1}% |\n", s.exposure * 100.0));
    md.push('\n');

    if !s.exit_counts.is_empty() {
        md.push_str("## Exits\n\n");
        md.push_str("| Reason | Count |\n");
        md.push_str("| --- | --- |\n");
        for (reason, count) in &s.exit_counts {
            md.push_str(&format!("| {} | {} |\n", reason.as_str(), count));
        }
        md.push('\n');
    }

    if !result.trades.is_empty() {
        md.push_str("## Recent Trades\n\n");
        md.push_str("| Entry | Exit | Reason | Return |\n");
        md.push_str("| --- | --- | --- | --- |\n");
        let skip = result.trades.len().saturating_sub(10);
        for t in &result.trades[skip..] {
            md.push_str(&format!(
                "| {} @ {:.2} | {} @ {:.2} | {} | {:.2}% |\n",
                t.entry_timestamp,
                t.entry_price,
                t.exit_timestamp,
                t.exit_price,
                t.exit_reason.as_str(),
                t.net_return * 100.0
            ));
        }
        md.push('\n');
    }

    if result
        .trades
        .last()
        .is_some_and(|t| t.exit_reason == ExitReason::Eod)
    {
        md.push_str("_The last trade was closed at the end of data._\n");
    }

    md
}

fn pct_or_off(pct: f64) -> String {
    if pct > 0.0 {
        format!("{pct}%")
    } else {
        "off".to_string()
    }
}
