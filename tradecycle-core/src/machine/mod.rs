//! Mode state machine: which side the instrument is hunting for or holding,
//! and the open legs.
//!
//! Evaluation is split from execution. `Machine::evaluate` reads one bar and
//! returns `Decision`s without touching the broker; the engine executes them
//! and feeds the fills back through `Machine::apply_open` and
//! `Machine::apply_close`. A bar whose evaluation fails leaves the machine
//! untouched because the engine evaluates on a copy. Each bar index is
//! evaluated at most once; a repeat yields no decisions and changes nothing.

pub mod entry;
pub mod exit;
pub mod straddle;

use crate::adapter::{IndicatorFrame, SeriesKey};
use crate::config::{EngineConfig, IndicatorSet, SessionConfig};
use crate::context::{DailyContext, WeeklyContext};
use crate::domain::{Bar, ExitReason, Position, Side};
use crate::engine::Session;
use crate::error::DataError;
use crate::signals::{BarView, ExitSignals, PatternSignal, SignalBank};
use crate::thresholds::LegThresholds;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeState {
    EnterLong,
    HoldLong,
    EnterShort,
    HoldShort,
}

impl ModeState {
    pub fn enter(side: Side) -> Self {
        match side {
            Side::Long => ModeState::EnterLong,
            Side::Short => ModeState::EnterShort,
        }
    }

    pub fn hold(side: Side) -> Self {
        match side {
            Side::Long => ModeState::HoldLong,
            Side::Short => ModeState::HoldShort,
        }
    }

    pub fn side(self) -> Side {
        match self {
            ModeState::EnterLong | ModeState::HoldLong => Side::Long,
            ModeState::EnterShort | ModeState::HoldShort => Side::Short,
        }
    }

    pub fn is_holding(self) -> bool {
        matches!(self, ModeState::HoldLong | ModeState::HoldShort)
    }
}

impl fmt::Display for ModeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModeState::EnterLong => "enter_long",
            ModeState::HoldLong => "hold_long",
            ModeState::EnterShort => "enter_short",
            ModeState::HoldShort => "hold_short",
        };
        f.write_str(s)
    }
}

/// Whether new positions on `side` are allowed at all.
pub fn can_trade(session: &SessionConfig, side: Side) -> bool {
    match side {
        Side::Long => !session.short_only,
        Side::Short => session.shortable || session.short_only,
    }
}

/// One bar and everything the machine may read about it.
#[derive(Debug, Clone, Copy)]
pub struct BarContext<'a> {
    /// History up to and including the current bar.
    pub bars: &'a [Bar],
    pub frame: &'a IndicatorFrame,
    pub session: Option<Session>,
    pub daily: Option<&'a DailyContext>,
    pub weekly: Option<&'a WeeklyContext>,
    pub pattern: Option<PatternSignal>,
}

impl<'a> BarContext<'a> {
    pub fn index(&self) -> usize {
        self.bars.len().saturating_sub(1)
    }

    pub fn bar(&self) -> Result<&'a Bar, DataError> {
        self.bars.last().ok_or(DataError::ShortHistory { needed: 1, index: 0 })
    }

    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        self.bars.last().map(|b| b.timestamp)
    }

    pub fn view(&self) -> Result<BarView<'a>, DataError> {
        Ok(BarView {
            frame: self.frame,
            index: self.index(),
            close: self.bar()?.close,
            pattern: self.pattern,
        })
    }

    /// Minutes from the current bar to the session close.
    fn minutes_to_close(&self) -> Option<i64> {
        let session = self.session?;
        let ts = self.timestamp()?;
        Some((session.close - ts).num_minutes())
    }

    /// Inside regular hours.
    fn in_session(&self) -> bool {
        match (self.session, self.timestamp()) {
            (Some(s), Some(ts)) => ts >= s.open && ts < s.close,
            _ => false,
        }
    }
}

/// An open position plus its live exit state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub position: Position,
    pub thresholds: LegThresholds,
    pub exit_signals: ExitSignals,
    /// Opposing leg opened by a straddle.
    pub hedge: bool,
    /// Entered while the squeeze secondary was confirmed.
    pub squeeze_entry: bool,
}

/// Values recorded with a new ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryInfo {
    pub natr: f64,
    pub adx: f64,
    pub snapshot: BTreeMap<String, f64>,
}

/// What the machine wants done with the broker for the current bar.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Open {
        side: Side,
        hedge: bool,
        quick_exit: bool,
        squeeze_entry: bool,
        info: EntryInfo,
    },
    Close {
        side: Side,
        hedge: bool,
        reason: ExitReason,
    },
}

/// Per-instrument decision state.
#[derive(Debug, Clone, PartialEq)]
pub struct Machine {
    mode: ModeState,
    legs: Vec<Leg>,
    bank: SignalBank,
    /// Last bar index evaluated successfully.
    last_index: Option<usize>,
}

impl Machine {
    pub fn new(set: IndicatorSet, session: &SessionConfig) -> Self {
        let side = if session.short_only { Side::Short } else { Side::Long };
        Self {
            mode: ModeState::enter(side),
            legs: Vec::new(),
            bank: SignalBank::new(set),
            last_index: None,
        }
    }

    pub fn mode(&self) -> ModeState {
        self.mode
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn bank(&self) -> &SignalBank {
        &self.bank
    }

    pub fn is_straddled(&self) -> bool {
        self.legs.len() > 1
    }

    /// Advance signals and thresholds by one bar and decide what to do.
    pub fn evaluate(&mut self, ctx: &BarContext<'_>, config: &EngineConfig) -> Result<Vec<Decision>, DataError> {
        let index = ctx.index();
        if self.last_index == Some(index) {
            return Ok(Vec::new());
        }
        let decisions = self.evaluate_bar(ctx, config)?;
        self.last_index = Some(index);
        Ok(decisions)
    }

    fn evaluate_bar(&mut self, ctx: &BarContext<'_>, config: &EngineConfig) -> Result<Vec<Decision>, DataError> {
        if !ctx.in_session() && !config.session.allow_overnight {
            return Ok(Vec::new());
        }
        let side = self.mode.side();
        let view = ctx.view()?;
        self.bank.update_squeeze(side, &view, config)?;
        if self.mode.is_holding() {
            exit::evaluate_hold(self, ctx, config)
        } else {
            entry::evaluate_entry(self, ctx, config)
        }
    }

    /// Close decisions for every open leg, bypassing entry gating.
    pub fn flatten(&self) -> Vec<Decision> {
        self.legs
            .iter()
            .map(|leg| Decision::Close {
                side: leg.position.side,
                hedge: leg.hedge,
                reason: ExitReason::Flatten,
            })
            .collect()
    }

    /// Record a filled open.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_open(
        &mut self,
        side: Side,
        hedge: bool,
        quick_exit: bool,
        squeeze_entry: bool,
        natr: f64,
        fill_price: f64,
        time: NaiveDateTime,
        quantity: f64,
        config: &EngineConfig,
    ) {
        self.legs.push(Leg {
            position: Position::open(side, fill_price, time, quantity),
            thresholds: LegThresholds::open(&config.exits, natr, quick_exit),
            exit_signals: ExitSignals::default(),
            hedge,
            squeeze_entry,
        });
        if !hedge {
            self.bank.reset();
            self.mode = ModeState::hold(side);
        }
    }

    /// Record a filled close. Returns the closed leg.
    ///
    /// Once the last leg is gone the machine hunts for the next entry: the
    /// opposite side after a long when shorting is allowed, long after a
    /// short unless short-only.
    pub fn apply_close(&mut self, side: Side, hedge: bool, config: &EngineConfig) -> Option<Leg> {
        let pos = self
            .legs
            .iter()
            .position(|l| l.position.side == side && l.hedge == hedge)?;
        let leg = self.legs.remove(pos);
        if self.legs.is_empty() {
            self.bank.reset();
            let held = self.mode.side();
            let next = match held {
                Side::Long if can_trade(&config.session, Side::Short) => Side::Short,
                Side::Long => Side::Long,
                Side::Short if config.session.short_only => Side::Short,
                Side::Short => Side::Long,
            };
            self.mode = ModeState::enter(next);
        }
        Some(leg)
    }

    pub(crate) fn bank_mut(&mut self) -> &mut SignalBank {
        &mut self.bank
    }

    pub(crate) fn set_mode(&mut self, mode: ModeState) {
        self.mode = mode;
    }

    pub(crate) fn legs_mut(&mut self) -> &mut [Leg] {
        &mut self.legs
    }
}

/// Indicator values stored with every ticket.
pub(crate) fn entry_info(frame: &IndicatorFrame, index: usize) -> EntryInfo {
    EntryInfo {
        natr: frame.value_or_nan(SeriesKey::Natr, index),
        adx: frame.value_or_nan(SeriesKey::Adx, index),
        snapshot: frame.snapshot(index),
    }
}
