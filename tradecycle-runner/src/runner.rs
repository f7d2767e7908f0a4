//! Backtest runner: wires config, data, contexts, engine and metrics.
//!
//! Entry points:
//! - `run_backtest()`: every instrument of a `RunConfig`, on the rayon pool
//!   when `run.parallel` is set. Used by the CLI.
//! - `run_instrument()`: loads one instrument's files, then runs.
//! - `run_with_bars()`: pre-loaded bars and market data, no I/O.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, info_span};

use tradecycle_core::config::EngineConfig;
use tradecycle_core::domain::{Action, Bar, TradeRecord};
use tradecycle_core::engine::{PaperBroker, RegularHours};
use tradecycle_core::fingerprint::RunFingerprint;
use tradecycle_core::{BatchDriver, ContextBook, Engine, EngineError, EngineStats, LedgerSummary};

use crate::config::{ConfigError, InstrumentConfig, RunConfig, RunSection};
use crate::contexts::{build_contexts, ContextOptions};
use crate::data_loader::{load_bars, CsvMarketData, LoadError};
use crate::metrics::{session_equity, PerformanceMetrics};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Load(#[from] LoadError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("cannot fingerprint config: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// Schema version of persisted results.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Complete result of one instrument run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub symbol: String,
    pub fingerprint: RunFingerprint,
    pub actions: Vec<Action>,
    pub trades: Vec<TradeRecord>,
    pub summary: LedgerSummary,
    pub metrics: PerformanceMetrics,
    pub stats: EngineStats,
    pub equity_curve: Vec<f64>,
    pub warmup_bars: usize,
}

/// Bars and external series of one instrument, ready to run.
#[derive(Debug, Clone)]
pub struct InstrumentData {
    pub bars: Vec<Bar>,
    pub market: CsvMarketData,
}

pub fn load_instrument(config: &RunConfig, instrument: &InstrumentConfig) -> Result<InstrumentData, RunError> {
    let bars = load_bars(&config.resolve(&instrument.bars))?;
    let breadth = instrument.breadth.as_ref().map(|p| config.resolve(p));
    let relative_strength = instrument.relative_strength.as_ref().map(|p| config.resolve(p));
    let market = CsvMarketData::load(breadth.as_deref(), relative_strength.as_deref())?;
    Ok(InstrumentData { bars, market })
}

pub fn context_options(engine: &EngineConfig, run: &RunSection) -> ContextOptions {
    ContextOptions {
        tick_size: engine.resistance.tick_size,
        key_level_days: run.key_level_days,
        atr_period: run.key_level_atr_period,
    }
}

fn session_dates(bars: &[Bar]) -> Vec<NaiveDate> {
    let mut dates: Vec<NaiveDate> = bars.iter().map(Bar::date).collect();
    dates.dedup();
    dates
}

/// Run pre-loaded data through a paper engine with the batch driver.
pub fn run_with_bars(
    engine_config: &EngineConfig,
    bars: &[Bar],
    market: CsvMarketData,
    run: &RunSection,
) -> Result<InstrumentResult, RunError> {
    let fingerprint = RunFingerprint::new(engine_config, bars)?;
    let contexts = if run.build_contexts {
        build_contexts(bars, &context_options(engine_config, run))
    } else {
        ContextBook::new()
    };

    let mut engine = Engine::new(
        engine_config.clone(),
        Box::new(PaperBroker::new()),
        Box::new(market),
        Box::new(RegularHours::default()),
    )?;
    let warmup_bars = engine.warmup();
    let report = BatchDriver::new(run.flatten_at_end).run(&mut engine, bars, &contexts)?;

    let trades = engine.ledger().trades().to_vec();
    let equity_curve = session_equity(&session_dates(bars), &trades, run.initial_capital);
    let metrics = PerformanceMetrics::compute(&equity_curve, &trades);

    Ok(InstrumentResult {
        schema_version: SCHEMA_VERSION,
        symbol: engine_config.symbol.clone(),
        fingerprint,
        actions: report.actions,
        summary: engine.ledger().summary(),
        trades,
        metrics,
        stats: report.stats,
        equity_curve,
        warmup_bars,
    })
}

pub fn run_instrument(config: &RunConfig, instrument: &InstrumentConfig) -> Result<InstrumentResult, RunError> {
    let span = info_span!("instrument", symbol = %instrument.symbol);
    let _guard = span.enter();

    let data = load_instrument(config, instrument)?;
    let result = run_with_bars(&config.engine_for(instrument), &data.bars, data.market, &config.run)?;
    info!(
        trades = result.summary.trade_count,
        pnl = result.summary.total_pnl,
        skipped = result.stats.skipped_bars,
        config_hash = %result.fingerprint.config_hash.short(),
        "instrument done"
    );
    Ok(result)
}

/// Run every instrument. The first failure aborts the run.
pub fn run_backtest(config: &RunConfig) -> Result<Vec<InstrumentResult>, RunError> {
    config.validate()?;
    if config.run.parallel {
        config
            .instruments
            .par_iter()
            .map(|inst| run_instrument(config, inst))
            .collect()
    } else {
        config
            .instruments
            .iter()
            .map(|inst| run_instrument(config, inst))
            .collect()
    }
}
