//! TradeBot CLI: download, backtest, optimize, and alert commands.
//!
//! Commands:
//! - `download`: fetch bars through the provider fallback chain and save CSV
//! - `backtest`: run one backtest from a TOML config and/or flags
//! - `optimize`: sweep RSI thresholds and exit settings into a leaderboard
//! - `alert`: scan a watchlist for fresh MACD/RSI signals

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tradebot_core::data::{self, FallbackChain, Interval, SourcePreference};
use tradebot_core::domain::ExitReason;
use tradebot_core::engine::{EngineConfig, EquityMode, ExecutionTiming, Statistics};
use tradebot_core::signals::{MacdRsi, MacdTrend, RsiThreshold, StrategyConfig};
use tradebot_runner::export::{save_artifacts, save_leaderboard};
use tradebot_runner::optimize::{parse_float_range, parse_int_range};
use tradebot_runner::{
    load_bars, load_watchlist, run_alert_pass, run_single_backtest, AlertState, BacktestConfig,
    BacktestResult, Leaderboard, LogNotifier, Notifier, SortKey, Sweep, SweepCriteria, SweepGrid,
    TelegramNotifier,
};

#[derive(Parser)]
#[command(
    name = "tradebot",
    about = "TradeBot CLI: long-only signal backtester, optimizer and alerter"
)]
struct Cli {
    /// Debug logging (RUST_LOG overrides).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download bars and save one CSV per symbol.
    Download {
        /// Symbols to download (e.g., ERIC-B.ST SPY).
        #[arg(required = true)]
        symbols: Vec<String>,

        #[arg(long, default_value = "2018-01-01")]
        start: NaiveDate,

        /// Bar interval: 1d, 1h or 1wk.
        #[arg(long, default_value = "1d")]
        interval: Interval,

        /// auto, yahoo or stooq.
        #[arg(long, default_value = "auto")]
        source: SourcePreference,

        #[arg(long, default_value = "data")]
        out_dir: PathBuf,
    },
    /// Run a single backtest.
    Backtest {
        /// Path to a TOML config file. Flags override its values.
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        data: DataArgs,

        /// rsi_threshold, macd_rsi, macd_trend or macd_trend_relaxed.
        #[arg(long)]
        strategy: Option<String>,

        #[arg(long)]
        rsi_buy: Option<f64>,

        #[arg(long)]
        rsi_sell: Option<f64>,

        #[command(flatten)]
        engine: EngineArgs,

        /// Save manifest, trades, equity and report under this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Sweep RSI thresholds and exits, writing a leaderboard CSV.
    Optimize {
        #[command(flatten)]
        data: DataArgs,

        /// Ranges are `value`, `start:end` or `start:end:step`, end inclusive.
        #[arg(long, default_value = "48:52:1")]
        rsi_buy: String,

        #[arg(long, default_value = "55:61:1")]
        rsi_sell: String,

        /// Stop-loss percent range.
        #[arg(long, default_value = "0")]
        sl: String,

        /// Take-profit percent range.
        #[arg(long, default_value = "0")]
        tp: String,

        /// Trailing-stop percent range.
        #[arg(long, default_value = "0")]
        trail: String,

        /// Time-stop bars range.
        #[arg(long, default_value = "0")]
        tstop: String,

        /// Fee per side, in percent.
        #[arg(long, default_value_t = 0.0)]
        fee: f64,

        /// Slippage per side, in basis points.
        #[arg(long, default_value_t = 0)]
        slip: u32,

        /// same_bar_close or next_bar_open.
        #[arg(long, default_value = "same_bar_close")]
        timing: ExecutionTiming,

        /// Disable the SMA200 trend filter.
        #[arg(long, default_value_t = false)]
        no_trend: bool,

        /// Enable the ATR% volatility filter.
        #[arg(long, default_value_t = false)]
        atr_filter: bool,

        #[arg(long, default_value_t = 20)]
        min_trades: usize,

        /// Maximum drawdown magnitude, in percent.
        #[arg(long, default_value_t = 30.0)]
        max_dd: f64,

        #[arg(long, default_value_t = 1.2)]
        min_pf: f64,

        #[arg(long, default_value = "cagr")]
        sort_by: SortKey,

        /// Optimize before this date, then test the best row from it onwards.
        #[arg(long)]
        split: Option<NaiveDate>,

        #[arg(long, default_value = "leaderboard.csv")]
        out: PathBuf,

        /// Print the best parameter set as TOML-ready lines.
        #[arg(long, default_value_t = false)]
        print_best: bool,

        /// Rows shown in the terminal table.
        #[arg(long, default_value_t = 10)]
        top: usize,

        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
    /// Check a watchlist for new BUY/SELL signals.
    Alert {
        /// CSV with a `symbol` column.
        #[arg(long, default_value = "tickers.csv")]
        watchlist: PathBuf,

        #[arg(long, default_value = "6mo")]
        period: String,

        #[arg(long, default_value = "1d")]
        interval: Interval,

        #[arg(long, default_value = "alert_state.json")]
        state: PathBuf,

        /// Repeat the pass forever.
        #[arg(long = "loop", default_value_t = false)]
        repeat: bool,

        /// Seconds between passes with --loop.
        #[arg(long, default_value_t = 600)]
        seconds: u64,

        /// Print only BUY/SELL lines.
        #[arg(long, default_value_t = false)]
        only_signals: bool,

        /// Send new signals to Telegram (TELEGRAM_BOT_TOKEN, TELEGRAM_CHAT_ID).
        #[arg(long, default_value_t = false)]
        telegram: bool,

        /// Pause between symbols, in seconds.
        #[arg(long, default_value_t = 1.0)]
        sleep_between: f64,
    },
}

/// Where the bars come from.
#[derive(Args)]
struct DataArgs {
    #[arg(long)]
    symbol: Option<String>,

    #[arg(long)]
    start: Option<NaiveDate>,

    #[arg(long)]
    interval: Option<Interval>,

    #[arg(long)]
    source: Option<SourcePreference>,

    /// Read bars from a CSV file instead of downloading.
    #[arg(long, conflicts_with = "synthetic")]
    csv: Option<PathBuf>,

    /// Use deterministic synthetic bars.
    #[arg(long, default_value_t = false)]
    synthetic: bool,
}

impl DataArgs {
    /// Symbol from `--symbol`, else the CSV file stem, else `SYNTH` for synthetic runs.
    fn symbol(&self) -> Option<String> {
        self.symbol
            .clone()
            .or_else(|| {
                self.csv
                    .as_deref()
                    .and_then(Path::file_stem)
                    .map(|s| s.to_string_lossy().into_owned())
            })
            .or_else(|| self.synthetic.then(|| "SYNTH".to_string()))
    }

    fn apply(&self, config: &mut BacktestConfig) {
        let section = &mut config.backtest;
        if let Some(symbol) = &self.symbol {
            section.symbol = symbol.clone();
        }
        if let Some(start) = self.start {
            section.start = start;
        }
        if let Some(interval) = self.interval {
            section.interval = interval;
        }
        if let Some(source) = self.source {
            section.source = source;
        }
        if let Some(csv) = &self.csv {
            section.csv_path = Some(csv.clone());
            section.synthetic = false;
        }
        if self.synthetic {
            section.synthetic = true;
            section.csv_path = None;
        }
    }

    /// Config from `file` (if any) with these flags applied on top.
    fn config(&self, file: Option<&Path>) -> Result<BacktestConfig> {
        let mut config = match file {
            Some(path) => BacktestConfig::from_file(path)?,
            None => match self.symbol() {
                Some(symbol) => BacktestConfig::for_symbol(symbol),
                None => bail!("one of --config, --symbol, --csv or --synthetic is required"),
            },
        };
        self.apply(&mut config);
        Ok(config)
    }
}

/// Engine overrides for `backtest`.
#[derive(Args)]
struct EngineArgs {
    /// Stop-loss percent below entry.
    #[arg(long)]
    sl: Option<f64>,

    /// Take-profit percent above entry.
    #[arg(long)]
    tp: Option<f64>,

    /// Trailing-stop percent below the high-water mark.
    #[arg(long)]
    trail: Option<f64>,

    /// Exit after this many bars.
    #[arg(long)]
    tstop: Option<usize>,

    /// Chandelier stop: ATR multiple below the high-water mark.
    #[arg(long)]
    chandelier: Option<f64>,

    /// Fee per side, in percent.
    #[arg(long)]
    fee: Option<f64>,

    /// Slippage per side, in basis points.
    #[arg(long)]
    slip: Option<u32>,

    #[arg(long)]
    timing: Option<ExecutionTiming>,

    /// realized_only or mark_to_market.
    #[arg(long)]
    equity_mode: Option<EquityMode>,

    #[arg(long)]
    capital: Option<f64>,

    #[arg(long, default_value_t = false)]
    fractional: bool,
}

impl EngineArgs {
    fn apply(&self, engine: &mut EngineConfig) {
        if let Some(v) = self.sl {
            engine.stop_loss_pct = v;
        }
        if let Some(v) = self.tp {
            engine.take_profit_pct = v;
        }
        if let Some(v) = self.trail {
            engine.trailing_stop_pct = v;
        }
        if let Some(v) = self.tstop {
            engine.time_stop_bars = v;
        }
        if let Some(v) = self.chandelier {
            engine.chandelier_atr_mult = v;
        }
        if let Some(v) = self.fee {
            engine.fee_fraction = v / 100.0;
        }
        if let Some(v) = self.slip {
            engine.slippage_bps = v;
        }
        if let Some(v) = self.timing {
            engine.execution_timing = v;
        }
        if let Some(v) = self.equity_mode {
            engine.equity_mode = v;
        }
        if let Some(v) = self.capital {
            engine.capital = v;
        }
        if self.fractional {
            engine.fractional_units = true;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Download {
            symbols,
            start,
            interval,
            source,
            out_dir,
        } => run_download(&symbols, start, interval, source, &out_dir),
        Commands::Backtest {
            config,
            data,
            strategy,
            rsi_buy,
            rsi_sell,
            engine,
            output_dir,
        } => {
            let mut cfg = data.config(config.as_deref())?;
            if let Some(name) = strategy {
                cfg.strategy = strategy_by_name(&name)?;
            }
            apply_thresholds(&mut cfg.strategy, rsi_buy, rsi_sell)?;
            engine.apply(&mut cfg.engine);
            run_backtest_cmd(&cfg, output_dir.as_deref())
        }
        Commands::Optimize {
            data,
            rsi_buy,
            rsi_sell,
            sl,
            tp,
            trail,
            tstop,
            fee,
            slip,
            timing,
            no_trend,
            atr_filter,
            min_trades,
            max_dd,
            min_pf,
            sort_by,
            split,
            out,
            print_best,
            top,
            sequential,
        } => {
            let grid = SweepGrid {
                rsi_buy: parse_float_range(&rsi_buy)?,
                rsi_sell: parse_float_range(&rsi_sell)?,
                stop_loss_pct: parse_float_range(&sl)?,
                take_profit_pct: parse_float_range(&tp)?,
                trailing_stop_pct: parse_float_range(&trail)?,
                time_stop_bars: parse_int_range(&tstop)?,
            };
            let base_signal = RsiThreshold {
                use_trend: !no_trend,
                use_atr: atr_filter,
                ..RsiThreshold::default()
            };
            let base_engine = EngineConfig::default()
                .with_costs(fee / 100.0, slip)
                .with_timing(timing);
            let sweep = Sweep::new(base_signal, base_engine)
                .with_criteria(SweepCriteria {
                    min_trades,
                    max_drawdown_pct: max_dd,
                    min_profit_factor: min_pf,
                })
                .with_sort_key(sort_by)
                .with_parallelism(!sequential);
            let cfg = data.config(None)?;
            run_optimize(&cfg, &sweep, &grid, split, &out, print_best, top)
        }
        Commands::Alert {
            watchlist,
            period,
            interval,
            state,
            repeat,
            seconds,
            only_signals,
            telegram,
            sleep_between,
        } => {
            let opts = AlertOptions {
                period,
                interval,
                only_signals,
                pause: Duration::from_secs_f64(sleep_between.max(0.0)),
            };
            run_alert_cmd(&watchlist, &state, &opts, repeat, seconds, telegram)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn strategy_by_name(name: &str) -> Result<StrategyConfig> {
    Ok(match name {
        "rsi_threshold" => StrategyConfig::RsiThreshold(RsiThreshold::default()),
        "macd_rsi" => StrategyConfig::MacdRsi(MacdRsi::default()),
        "macd_trend" => StrategyConfig::MacdTrend(MacdTrend::strict()),
        "macd_trend_relaxed" => StrategyConfig::MacdTrend(MacdTrend::relaxed()),
        other => bail!(
            "unknown strategy '{other}'. Valid: rsi_threshold, macd_rsi, macd_trend, macd_trend_relaxed"
        ),
    })
}

fn apply_thresholds(
    strategy: &mut StrategyConfig,
    rsi_buy: Option<f64>,
    rsi_sell: Option<f64>,
) -> Result<()> {
    if rsi_buy.is_none() && rsi_sell.is_none() {
        return Ok(());
    }
    let StrategyConfig::RsiThreshold(s) = strategy else {
        bail!("--rsi-buy/--rsi-sell only apply to the rsi_threshold strategy");
    };
    if let Some(v) = rsi_buy {
        s.rsi_buy = v;
    }
    if let Some(v) = rsi_sell {
        s.rsi_sell = v;
    }
    Ok(())
}

/// Provider chain, only when the config actually downloads.
fn chain_for(config: &BacktestConfig) -> Result<Option<FallbackChain>> {
    if config.backtest.synthetic || config.backtest.csv_path.is_some() {
        return Ok(None);
    }
    Ok(Some(FallbackChain::online()?))
}

fn run_download(
    symbols: &[String],
    start: NaiveDate,
    interval: Interval,
    source: SourcePreference,
    out_dir: &Path,
) -> Result<()> {
    let chain = FallbackChain::online()?;
    let mut failed = Vec::new();

    for symbol in symbols {
        match chain.fetch(symbol, start, interval, source) {
            Ok(result) => {
                let path = out_dir.join(format!("{}_{}.csv", file_safe(symbol), interval));
                data::save_csv(&path, &result.bars)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                let suspicious = data::suspicious_rows(&result.bars).len();
                println!(
                    "{symbol}: {} bars from {} -> {}",
                    result.bars.len(),
                    result.source,
                    path.display()
                );
                if suspicious > 0 {
                    println!("  WARNING: {suspicious} suspicious row(s)");
                }
            }
            Err(e) => {
                eprintln!("Error for {symbol}: {e}");
                failed.push(symbol.as_str());
            }
        }
    }

    if !failed.is_empty() {
        bail!("download failed for: {}", failed.join(", "));
    }
    Ok(())
}

fn file_safe(symbol: &str) -> String {
    symbol.replace(['/', '\\', ':', '^'], "_")
}

fn run_backtest_cmd(config: &BacktestConfig, output_dir: Option<&Path>) -> Result<()> {
    config.validate()?;
    let chain = chain_for(config)?;
    let result = run_single_backtest(config, chain.as_ref())?;

    print_summary(&result);

    if let Some(dir) = output_dir {
        let run_dir = save_artifacts(&result, dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn run_optimize(
    config: &BacktestConfig,
    sweep: &Sweep,
    grid: &SweepGrid,
    split: Option<NaiveDate>,
    out: &Path,
    print_best: bool,
    top: usize,
) -> Result<()> {
    let chain = chain_for(config)?;
    let loaded = load_bars(config, chain.as_ref())?;
    let combos = grid.combinations().len();
    println!(
        "Sweeping {combos} combination(s) over {} bars of {} ({} skipped: rsi_buy >= rsi_sell)",
        loaded.bars.len(),
        loaded.symbol,
        grid.degenerate_count()
    );

    let (leaderboard, test_row) = match split {
        Some(date) => {
            let report = sweep.train_test(&loaded.bars, date, grid)?;
            println!(
                "Train: {} bars before {date}, test: {} bars",
                report.train_bars, report.test_bars
            );
            print_sweep_counts(report.train.evaluated, report.train.rejected);
            (report.train.leaderboard, report.test)
        }
        None => {
            let step = (combos / 10).max(1);
            let summary = sweep.run_with_progress(&loaded.bars, grid, |done, total| {
                if done % step == 0 || done == total {
                    tracing::info!(done, total, "sweep progress");
                }
            })?;
            print_sweep_counts(summary.evaluated, summary.rejected);
            (summary.leaderboard, None)
        }
    };

    save_leaderboard(&leaderboard, out)?;
    println!("Leaderboard ({} rows) saved to: {}", leaderboard.len(), out.display());

    if leaderboard.is_empty() {
        println!("No combination met the criteria.");
        return Ok(());
    }
    println!();
    print!("{}", leaderboard.format_table(top));

    if let Some(row) = test_row {
        println!();
        println!("--- Out-of-sample (best train row) ---");
        print!("{}", Leaderboard::new(vec![row], sweep.sort_key).format_table(1));
    }

    if print_best {
        if let Some(best) = leaderboard.best() {
            let p = &best.params;
            println!();
            println!("[strategy]");
            println!("type = \"rsi_threshold\"");
            println!("rsi_buy = {:?}", p.rsi_buy);
            println!("rsi_sell = {:?}", p.rsi_sell);
            println!();
            println!("[engine]");
            println!("stop_loss_pct = {:?}", p.stop_loss_pct);
            println!("take_profit_pct = {:?}", p.take_profit_pct);
            println!("trailing_stop_pct = {:?}", p.trailing_stop_pct);
            println!("time_stop_bars = {}", p.time_stop_bars);
        }
    }
    Ok(())
}

fn print_sweep_counts(evaluated: usize, rejected: usize) {
    println!("Evaluated {evaluated}, rejected by criteria {rejected}");
}

struct AlertOptions {
    period: String,
    interval: Interval,
    only_signals: bool,
    pause: Duration,
}

fn run_alert_cmd(
    watchlist: &Path,
    state_path: &Path,
    opts: &AlertOptions,
    repeat: bool,
    seconds: u64,
    telegram: bool,
) -> Result<()> {
    let symbols = load_watchlist(watchlist)?;
    let chain = FallbackChain::online()?;
    let notifier: Box<dyn Notifier> = if telegram {
        match TelegramNotifier::from_env() {
            Ok(n) => Box::new(n),
            Err(e) => {
                tracing::warn!(error = %e, "telegram not configured, logging only");
                Box::new(LogNotifier)
            }
        }
    } else {
        Box::new(LogNotifier)
    };

    tracing::info!(
        symbols = symbols.len(),
        notifier = notifier.name(),
        "starting alert scan"
    );

    loop {
        if let Err(e) = alert_pass(&chain, &symbols, state_path, opts, notifier.as_ref()) {
            if !repeat {
                return Err(e);
            }
            tracing::error!(error = %e, "alert pass failed");
        }
        if !repeat {
            return Ok(());
        }
        std::thread::sleep(Duration::from_secs(seconds));
    }
}

fn alert_pass(
    chain: &FallbackChain,
    symbols: &[String],
    state_path: &Path,
    opts: &AlertOptions,
    notifier: &dyn Notifier,
) -> Result<()> {
    let state = AlertState::load(state_path)?;
    let fetch = |symbol: &str| {
        let result = chain
            .fetch_period(symbol, &opts.period, opts.interval)
            .map(|r| r.bars);
        std::thread::sleep(opts.pause);
        result
    };
    let (state, report) = run_alert_pass(state, symbols, fetch, notifier);

    for alert in &report.alerts {
        println!("{alert}");
    }
    if !opts.only_signals {
        for line in &report.quiet {
            println!("{line}");
        }
        for (symbol, error) in &report.failures {
            println!("{symbol}: {error}");
        }
    }
    state.save(state_path)?;
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let s: &Statistics = &result.stats;
    println!();
    println!("=== Backtest Result ===");
    println!("Symbol:         {}", result.symbol);
    println!("Strategy:       {}", result.strategy);
    println!("Period:         {} to {}", result.start_date, result.end_date);
    println!(
        "Bars:           {} ({} warmup)",
        result.bar_count, result.warmup_bars
    );
    println!("BUY signals:    {}", result.signal_count);
    println!("Data source:    {}", result.data_source);
    println!("Trades:         {}", s.trades);
    println!();
    println!("--- Performance ---");
    println!("Total Return:   {:.2}%", s.total_return * 100.0);
    println!("CAGR:           {:.2}%", s.cagr * 100.0);
    println!("Max Drawdown:   {:.2}%", s.max_drawdown * 100.0);
    println!("Win Rate:       {:.1}%", s.win_rate * 100.0);
    if s.profit_factor.is_nan() {
        println!("Profit Factor:  n/a");
    } else {
        println!("Profit Factor:  {:.2}", s.profit_factor);
    }
    println!("Expectancy:     {:.2}%", s.expectancy * 100.0);
    println!("Exposure:       {:.1}%", s.exposure * 100.0);
    let exits: Vec<String> = [
        ExitReason::Stop,
        ExitReason::Trail,
        ExitReason::Tp,
        ExitReason::Time,
        ExitReason::Signal,
        ExitReason::Eod,
    ]
    .into_iter()
    .filter(|r| s.exits(*r) > 0)
    .map(|r| format!("{}={}", r.as_str(), s.exits(r)))
    .collect();
    if !exits.is_empty() {
        println!("Exits:          {}", exits.join(" "));
    }
    if result.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    println!();
}
