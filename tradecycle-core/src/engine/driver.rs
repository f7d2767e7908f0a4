//! Batch and streaming drivers over one `Engine`.
//!
//! Both feed the engine the same history prefix for every bar, so an
//! identical bar sequence yields identical actions and ledgers.

use super::{Engine, EngineStats};
use crate::context::{DailyContext, WeeklyContext};
use crate::domain::{Action, Bar};
use crate::error::{EngineError, InvariantViolation};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, info};

/// Bar ordering: strictly increasing, unique timestamps.
fn check_order(previous: Option<NaiveDateTime>, next: NaiveDateTime) -> Result<(), InvariantViolation> {
    match previous {
        Some(prev) if prev == next => Err(InvariantViolation::Duplicate(next)),
        Some(prev) if prev > next => Err(InvariantViolation::OutOfOrder { previous: prev, next }),
        _ => Ok(()),
    }
}

/// Daily and weekly resistance contexts by session date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextBook {
    daily: BTreeMap<NaiveDate, DailyContext>,
    /// Keyed by the first date each context applies to.
    weekly: BTreeMap<NaiveDate, WeeklyContext>,
}

impl ContextBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_daily(&mut self, context: DailyContext) {
        self.daily.insert(context.date, context);
    }

    /// `context` applies from `from` until the next weekly insert.
    pub fn insert_weekly(&mut self, from: NaiveDate, context: WeeklyContext) {
        self.weekly.insert(from, context);
    }

    pub fn daily(&self, date: NaiveDate) -> Option<&DailyContext> {
        self.daily.get(&date)
    }

    pub fn weekly(&self, date: NaiveDate) -> Option<&WeeklyContext> {
        self.weekly.range(..=date).next_back().map(|(_, w)| w)
    }

    pub fn daily_len(&self) -> usize {
        self.daily.len()
    }

    pub fn weekly_len(&self) -> usize {
        self.weekly.len()
    }
}

/// Everything a batch run produced besides the ledger.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub actions: Vec<Action>,
    pub stats: EngineStats,
}

/// Runs a materialized bar array through an engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchDriver {
    /// Close any open leg on the last bar.
    pub flatten_at_end: bool,
}

impl BatchDriver {
    pub fn new(flatten_at_end: bool) -> Self {
        Self { flatten_at_end }
    }

    pub fn run(&self, engine: &mut Engine, bars: &[Bar], contexts: &ContextBook) -> Result<BatchReport, EngineError> {
        let mut previous = None;
        for bar in bars {
            check_order(previous, bar.timestamp)?;
            previous = Some(bar.timestamp);
        }
        for bar in bars {
            engine.prepare(bar);
        }
        let frame = engine.frame(bars);

        let mut actions = Vec::new();
        for i in 0..bars.len() {
            let date = bars[i].date();
            actions.extend(engine.step(&bars[..=i], &frame, contexts.daily(date), contexts.weekly(date))?);
        }
        if let (true, Some(last)) = (self.flatten_at_end, bars.last()) {
            actions.extend(engine.flatten(last)?);
        }
        info!(
            symbol = %engine.symbol(),
            bars = bars.len(),
            actions = actions.len(),
            trades = engine.ledger().trades().len(),
            "batch run complete"
        );
        Ok(BatchReport {
            actions,
            stats: engine.stats(),
        })
    }
}

/// Drives an engine one inbound bar at a time.
///
/// Any error freezes the instrument: later bars return `EngineError::Frozen`.
/// An `EngineError::Partial` carries the actions filled on the failing bar
/// before the broker gave out. `flatten` is still honored while frozen.
#[derive(Debug)]
pub struct StreamingDriver {
    engine: Engine,
    history: Vec<Bar>,
    frozen: Option<String>,
}

impl StreamingDriver {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            history: Vec::new(),
            frozen: None,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn into_engine(self) -> Engine {
        self.engine
    }

    pub fn history(&self) -> &[Bar] {
        &self.history
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.is_some()
    }

    pub fn on_bar(
        &mut self,
        bar: Bar,
        weekly: Option<&WeeklyContext>,
        daily: Option<&DailyContext>,
    ) -> Result<Vec<Action>, EngineError> {
        if let Some(cause) = &self.frozen {
            return Err(EngineError::Frozen {
                symbol: self.engine.symbol().to_string(),
                cause: cause.clone(),
            });
        }
        let result = self.advance(bar, weekly, daily);
        if let Err(err) = &result {
            error!(symbol = %self.engine.symbol(), error = %err, "instrument frozen");
            self.frozen = Some(err.to_string());
        }
        result
    }

    /// The causal frame is rebuilt over the whole history on every bar, so a
    /// session costs quadratic time in its bar count and stays identical to
    /// the batch frame.
    // TODO: extend the frame incrementally once every indicator exposes a streaming update.
    fn advance(&mut self, bar: Bar, weekly: Option<&WeeklyContext>, daily: Option<&DailyContext>) -> Result<Vec<Action>, EngineError> {
        check_order(self.history.last().map(|b| b.timestamp), bar.timestamp)?;
        self.engine.prepare(&bar);
        self.history.push(bar);
        let frame = self.engine.frame(&self.history);
        self.engine.step(&self.history, &frame, daily, weekly)
    }

    /// Close every open leg at the last seen bar.
    pub fn flatten(&mut self) -> Result<Vec<Action>, EngineError> {
        match self.history.last() {
            Some(bar) => self.engine.flatten(bar),
            None => Ok(Vec::new()),
        }
    }
}
