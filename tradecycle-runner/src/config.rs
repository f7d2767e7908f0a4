//! Run configuration loaded from TOML.
//!
//! ```toml
//! [run]
//! data_dir = "data"
//! output_dir = "out"
//!
//! [engine]
//! primary = "stochrsi"
//! secondaries = ["adx"]
//!
//! [[instrument]]
//! symbol = "SPY"
//! bars = "spy.csv"
//!
//! [[instrument]]
//! symbol = "QQQ"
//! bars = "qqq.csv"
//! breadth = "breadth.csv"
//! [instrument.engine]
//! primary = "breadth"
//! ```
//!
//! An instrument's `[instrument.engine]` table replaces the shared `[engine]`
//! table for that instrument. Either way the instrument symbol wins.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tradecycle_core::config::EngineConfig;
use tradecycle_core::fingerprint::ConfigHash;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("instrument {symbol}: {source}")]
    Engine {
        symbol: String,
        #[source]
        source: tradecycle_core::ConfigError,
    },

    #[error("no [[instrument]] entries")]
    NoInstruments,

    #[error("instrument {0} is listed twice")]
    DuplicateSymbol(String),
}

/// `[run]`: where data lives and how the batch is driven.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSection {
    /// Base directory for relative instrument paths.
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Evaluate instruments on the rayon pool.
    pub parallel: bool,
    /// Close any open leg on the last bar of each instrument.
    pub flatten_at_end: bool,
    /// Derive daily and weekly resistance contexts from the bars.
    pub build_contexts: bool,
    /// Daily aggregates searched for weekly key levels.
    pub key_level_days: usize,
    pub key_level_atr_period: usize,
    /// Starting capital of the realized equity curve.
    pub initial_capital: f64,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            output_dir: PathBuf::from("out"),
            parallel: true,
            flatten_at_end: true,
            build_contexts: true,
            key_level_days: 120,
            key_level_atr_period: 14,
            initial_capital: 10_000.0,
        }
    }
}

/// One `[[instrument]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub symbol: String,
    /// OHLCV CSV, relative to `run.data_dir` unless absolute.
    pub bars: PathBuf,
    #[serde(default)]
    pub breadth: Option<PathBuf>,
    #[serde(default)]
    pub relative_strength: Option<PathBuf>,
    /// Replaces the shared `[engine]` table.
    #[serde(default)]
    pub engine: Option<EngineConfig>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub run: RunSection,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default, rename = "instrument")]
    pub instruments: Vec<InstrumentConfig>,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        // Relative data dirs are relative to the config file.
        if config.run.data_dir.is_relative() {
            if let Some(parent) = path.parent() {
                config.run.data_dir = parent.join(&config.run.data_dir);
            }
        }
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// The engine configuration one instrument runs with.
    pub fn engine_for(&self, instrument: &InstrumentConfig) -> EngineConfig {
        let mut engine = instrument.engine.clone().unwrap_or_else(|| self.engine.clone());
        engine.symbol = instrument.symbol.clone();
        engine
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.run.data_dir.join(path)
        }
    }

    /// Validate every instrument's engine configuration up front, so a bad
    /// table fails the run before any data is read.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instruments.is_empty() {
            return Err(ConfigError::NoInstruments);
        }
        let mut seen = HashSet::new();
        for inst in &self.instruments {
            if !seen.insert(inst.symbol.as_str()) {
                return Err(ConfigError::DuplicateSymbol(inst.symbol.clone()));
            }
            self.engine_for(inst)
                .validate()
                .map_err(|source| ConfigError::Engine {
                    symbol: inst.symbol.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Config hash per instrument, in file order.
    pub fn fingerprints(&self) -> Vec<(String, Option<ConfigHash>)> {
        self.instruments
            .iter()
            .map(|inst| (inst.symbol.clone(), ConfigHash::of(&self.engine_for(inst)).ok()))
            .collect()
    }
}
