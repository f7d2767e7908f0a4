//! tradecycle runner: backtest and replay orchestration over the decision core.
//!
//! This crate builds on `tradecycle-core` to provide:
//! - TOML run configuration with per-instrument engine overrides
//! - CSV bar and external-series loading, synthetic bars
//! - Daily and weekly resistance contexts derived from the bars
//! - Batch backtests across instruments (rayon) and a live replay session
//! - Performance metrics and JSON / CSV / Markdown export

pub mod config;
pub mod contexts;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod replay;
pub mod runner;
pub mod synthetic;

pub use config::{ConfigError, InstrumentConfig, RunConfig, RunSection};
pub use contexts::{build_contexts, ContextOptions};
pub use data_loader::{load_bars, load_series, write_bars_csv, CsvMarketData, LoadError};
pub use metrics::PerformanceMetrics;
pub use replay::{ReplayOutcome, ReplaySession};
pub use runner::{run_backtest, run_instrument, run_with_bars, InstrumentData, InstrumentResult, RunError};
