//! Live replay: every instrument's bars fed one at a time, interleaved by
//! timestamp, through a streaming driver per instrument.
//!
//! A failure freezes only the instrument it happened on. The others keep
//! trading. At the end of the feed every instrument is flattened when
//! `run.flatten_at_end` is set, frozen ones included.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tradecycle_core::config::EngineConfig;
use tradecycle_core::domain::{Action, Bar, TradeRecord};
use tradecycle_core::engine::{PaperBroker, RegularHours};
use tradecycle_core::{ContextBook, Engine, EngineError, EngineStats, LedgerSummary, StreamingDriver};

use crate::config::{RunConfig, RunSection};
use crate::contexts::build_contexts;
use crate::runner::{context_options, load_instrument, InstrumentData, RunError};

/// Per-instrument outcome of a replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayOutcome {
    pub symbol: String,
    pub actions: Vec<Action>,
    pub trades: Vec<TradeRecord>,
    pub summary: LedgerSummary,
    pub stats: EngineStats,
    /// The error that froze the instrument, if any.
    pub frozen: Option<String>,
    /// Bars refused after the freeze.
    pub refused_bars: usize,
}

struct Feed {
    symbol: String,
    driver: StreamingDriver,
    bars: Vec<Bar>,
    contexts: ContextBook,
    actions: Vec<Action>,
    frozen: Option<String>,
    refused_bars: usize,
}

impl Feed {
    fn record(&mut self, actions: &[Action], on_action: &mut impl FnMut(&str, &Action)) {
        for action in actions {
            on_action(&self.symbol, action);
        }
        self.actions.extend_from_slice(actions);
    }

    fn push(&mut self, index: usize, on_action: &mut impl FnMut(&str, &Action)) {
        let bar = self.bars[index];
        let date = bar.date();
        let result = self
            .driver
            .on_bar(bar, self.contexts.weekly(date), self.contexts.daily(date));
        match result {
            Ok(actions) => self.record(&actions, on_action),
            Err(EngineError::Frozen { .. }) => self.refused_bars += 1,
            Err(err) => {
                // The driver has already logged and frozen the instrument.
                self.record(err.completed(), on_action);
                self.frozen = Some(err.to_string());
            }
        }
    }

    fn finish(mut self, flatten: bool, on_action: &mut impl FnMut(&str, &Action)) -> ReplayOutcome {
        if flatten {
            match self.driver.flatten() {
                Ok(actions) => self.record(&actions, on_action),
                Err(err) => {
                    warn!(symbol = %self.symbol, error = %err, "flatten failed");
                    self.record(err.completed(), on_action);
                    self.frozen.get_or_insert_with(|| err.to_string());
                }
            }
        }
        let engine = self.driver.engine();
        ReplayOutcome {
            summary: engine.ledger().summary(),
            trades: engine.ledger().trades().to_vec(),
            stats: engine.stats(),
            symbol: self.symbol,
            actions: self.actions,
            frozen: self.frozen,
            refused_bars: self.refused_bars,
        }
    }
}

/// A set of instruments replayed against one shared clock.
pub struct ReplaySession {
    feeds: Vec<Feed>,
    flatten_at_end: bool,
}

impl std::fmt::Debug for ReplaySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplaySession")
            .field("instruments", &self.feeds.iter().map(|x| x.symbol.as_str()).collect::<Vec<_>>())
            .field("flatten_at_end", &self.flatten_at_end)
            .finish()
    }
}

impl ReplaySession {
    /// Load every instrument of `config` and build its engine.
    pub fn from_config(config: &RunConfig) -> Result<Self, RunError> {
        config.validate()?;
        let mut entries = Vec::with_capacity(config.instruments.len());
        for inst in &config.instruments {
            entries.push((config.engine_for(inst), load_instrument(config, inst)?));
        }
        Self::from_data(entries, &config.run)
    }

    pub fn from_data(entries: Vec<(EngineConfig, InstrumentData)>, run: &RunSection) -> Result<Self, RunError> {
        let mut feeds = Vec::with_capacity(entries.len());
        for (engine_config, data) in entries {
            let contexts = if run.build_contexts {
                build_contexts(&data.bars, &context_options(&engine_config, run))
            } else {
                ContextBook::new()
            };
            let symbol = engine_config.symbol.clone();
            let engine = Engine::new(
                engine_config,
                Box::new(PaperBroker::new()),
                Box::new(data.market),
                Box::new(RegularHours::default()),
            )?;
            feeds.push(Feed {
                symbol,
                driver: StreamingDriver::new(engine),
                bars: data.bars,
                contexts,
                actions: Vec::new(),
                frozen: None,
                refused_bars: 0,
            });
        }
        Ok(Self {
            feeds,
            flatten_at_end: run.flatten_at_end,
        })
    }

    /// Arrival order: by timestamp, ties broken by instrument order. Each
    /// instrument keeps its own file order, so its own regressions still
    /// reach its driver.
    fn schedule(&self) -> Vec<(usize, usize)> {
        let mut order: Vec<(NaiveDateTime, usize, usize)> = Vec::new();
        for (f, feed) in self.feeds.iter().enumerate() {
            let mut clock = NaiveDateTime::MIN;
            for (i, bar) in feed.bars.iter().enumerate() {
                clock = clock.max(bar.timestamp);
                order.push((clock, f, i));
            }
        }
        order.sort();
        order.into_iter().map(|(_, f, i)| (f, i)).collect()
    }

    /// Feed every bar, calling `on_action` as actions happen.
    pub fn run(mut self, mut on_action: impl FnMut(&str, &Action)) -> Vec<ReplayOutcome> {
        for (f, i) in self.schedule() {
            self.feeds[f].push(i, &mut on_action);
        }
        let flatten = self.flatten_at_end;
        let outcomes: Vec<ReplayOutcome> = self
            .feeds
            .into_iter()
            .map(|feed| feed.finish(flatten, &mut on_action))
            .collect();
        for outcome in &outcomes {
            info!(
                symbol = %outcome.symbol,
                trades = outcome.summary.trade_count,
                pnl = outcome.summary.total_pnl,
                frozen = outcome.frozen.is_some(),
                "replay done"
            );
        }
        outcomes
    }
}
