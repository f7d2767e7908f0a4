//! tradecycle CLI: backtest, replay, synthetic data and config checks.
//!
//! Commands:
//! - `backtest` : run every instrument of a TOML run config through the batch driver
//! - `replay` : feed the same instruments bar by bar through streaming drivers
//! - `synth` : write deterministic synthetic minute bars as CSV
//! - `check-config` : validate a run config and print each instrument's engine

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tradecycle_core::fingerprint::ConfigHash;
use tradecycle_runner::export::{save_replay, save_run};
use tradecycle_runner::synthetic::minute_bars;
use tradecycle_runner::{run_backtest, write_bars_csv, InstrumentResult, ReplaySession, RunConfig};

#[derive(Parser)]
#[command(name = "tradecycle", about = "tradecycle CLI : intraday trading-decision engine")]
struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a batch backtest from a TOML run config.
    Backtest {
        /// Path to the run config.
        #[arg(long)]
        config: PathBuf,

        /// Output directory. Defaults to `run.output_dir`.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Evaluate instruments one after another.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Print the summary only; write no artifacts.
        #[arg(long, default_value_t = false)]
        no_save: bool,
    },
    /// Replay the configured instruments bar by bar, interleaved by time.
    Replay {
        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Do not print actions as they happen.
        #[arg(long, default_value_t = false)]
        quiet: bool,
    },
    /// Write synthetic 1-minute bars as CSV.
    Synth {
        #[arg(long)]
        symbol: String,

        /// Number of weekday sessions.
        #[arg(long, default_value_t = 5)]
        days: usize,

        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Output CSV path.
        #[arg(long)]
        out: PathBuf,
    },
    /// Validate a run config and show the resolved engine per instrument.
    CheckConfig {
        #[arg(long)]
        config: PathBuf,

        /// Print each resolved engine config as JSON.
        #[arg(long, default_value_t = false)]
        print: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Backtest {
            config,
            output_dir,
            sequential,
            no_save,
        } => run_backtest_cmd(&config, output_dir, sequential, no_save),
        Commands::Replay {
            config,
            output_dir,
            quiet,
        } => run_replay_cmd(&config, output_dir, quiet),
        Commands::Synth {
            symbol,
            days,
            seed,
            out,
        } => run_synth(&symbol, days, seed, &out),
        Commands::CheckConfig { config, print } => run_check_config(&config, print),
    }
}

fn load_config(path: &Path) -> Result<RunConfig> {
    let config =
        RunConfig::load(path).with_context(|| format!("failed to load run config {}", path.display()))?;
    info!(path = %path.display(), instruments = config.instruments.len(), "run config loaded");
    Ok(config)
}

fn run_backtest_cmd(path: &Path, output_dir: Option<PathBuf>, sequential: bool, no_save: bool) -> Result<()> {
    let mut config = load_config(path)?;
    if sequential {
        config.run.parallel = false;
    }
    let results = run_backtest(&config)?;
    print_summary(&results);

    if !no_save {
        let out = output_dir.unwrap_or_else(|| config.run.output_dir.clone());
        let dirs = save_run(&results, &out)?;
        println!();
        for dir in dirs {
            println!("Artifacts saved to: {}", dir.display());
        }
    }
    Ok(())
}

fn print_summary(results: &[InstrumentResult]) {
    println!(
        "{:<8} {:>8} {:>7} {:>7} {:>8} {:>11} {:>9} {:>9}",
        "Symbol", "Bars", "Skip", "Trades", "Win%", "P&L", "Return%", "MaxDD%"
    );
    println!("{}", "-".repeat(75));
    for r in results {
        println!(
            "{:<8} {:>8} {:>7} {:>7} {:>7.1}% {:>11.2} {:>8.2}% {:>8.2}%",
            r.symbol,
            r.stats.bars,
            r.stats.skipped_bars,
            r.summary.trade_count,
            r.summary.win_rate * 100.0,
            r.summary.total_pnl,
            r.metrics.total_return * 100.0,
            r.metrics.max_drawdown * 100.0,
        );
    }
}

fn run_replay_cmd(path: &Path, output_dir: Option<PathBuf>, quiet: bool) -> Result<()> {
    let config = load_config(path)?;
    let session = ReplaySession::from_config(&config)?;
    let outcomes = session.run(|symbol, action| {
        if !quiet {
            let reason = action.reason.map(|r| format!(" ({r})")).unwrap_or_default();
            println!(
                "{} {:<6} {:<11} {:>6} @ {:.2}{reason}",
                action.timestamp, symbol, action.kind, action.quantity, action.price
            );
        }
    });

    let out = output_dir.unwrap_or_else(|| config.run.output_dir.clone());
    let path = save_replay(&outcomes, &out)?;
    println!("Replay saved to: {}", path.display());

    let frozen: Vec<&str> = outcomes
        .iter()
        .filter(|o| o.frozen.is_some())
        .map(|o| o.symbol.as_str())
        .collect();
    if !frozen.is_empty() {
        bail!("frozen instruments: {}", frozen.join(", "));
    }
    Ok(())
}

fn run_synth(symbol: &str, days: usize, seed: u64, out: &Path) -> Result<()> {
    if days == 0 {
        bail!("--days must be at least 1");
    }
    let bars = minute_bars(symbol, seed, days);
    write_bars_csv(out, &bars).with_context(|| format!("failed to write {}", out.display()))?;
    println!("Wrote {} bars for {symbol} to {}", bars.len(), out.display());
    Ok(())
}

fn run_check_config(path: &Path, print: bool) -> Result<()> {
    let config = load_config(path)?;
    config.validate()?;
    for inst in &config.instruments {
        let engine = config.engine_for(inst);
        let hash = ConfigHash::of(&engine).context("failed to fingerprint engine config")?;
        let secondaries = if engine.secondaries.is_empty() {
            "-".to_string()
        } else {
            engine.secondaries.join(",")
        };
        println!(
            "{:<8} primary={:<10} secondaries={:<24} config={}",
            inst.symbol,
            engine.primary,
            secondaries,
            hash.short()
        );
        if print {
            println!("{}", serde_json::to_string_pretty(&engine)?);
        }
    }
    println!("OK: {} instrument(s)", config.instruments.len());
    Ok(())
}
