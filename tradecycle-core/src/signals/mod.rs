//! Signal bank: pure evaluators that turn indicator values into sticky
//! `SignalState` flags, and the per-instrument bank that carries those flags
//! from bar to bar.
//!
//! Evaluators never see positions or thresholds. The bank commits a bar's
//! updates only once every evaluator has succeeded, so a bar skipped for
//! missing data leaves all state untouched. A bar index is consumed at most
//! once; evaluating it again reports the committed state.

pub mod pattern;
pub mod primary;
pub mod secondary;
pub mod squeeze;
pub mod stochastic;
pub mod trend_stack;

pub use pattern::{evaluate_pattern, PatternSignal};
pub use primary::{evaluate_primary, PrimaryOutcome};
pub use secondary::{evaluate_secondary, BarView};
pub use squeeze::{evaluate_squeeze, BandPair, SqueezeParams, SqueezeState};
pub use stochastic::{evaluate_stochastic, evaluate_stochastic_exit, StochInput, StochParams};
pub use trend_stack::{evaluate_trend_stack, Affinity};

use crate::adapter::SeriesKey;
use crate::config::{EngineConfig, IndicatorSet, PrimaryIndicator, SecondaryIndicator};
use crate::domain::Side;
use crate::error::DataError;
use serde::{Deserialize, Serialize};

/// Flags of one signal plus its small counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignalState {
    pub raw: bool,
    pub crossover: bool,
    pub threshold: bool,
    pub confirmed: bool,
    pub squeeze_count: u32,
    pub linger_count: u32,
}

/// Outcome of one entry-mode evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryCheck {
    /// The opposite side is set up; switch sides with no action.
    Jump,
    /// Primary not confirmed (or just cancelled).
    Waiting,
    /// Primary confirmed; `blocked` lists secondaries that are not.
    Primed { blocked: Vec<SecondaryIndicator> },
}

impl EntryCheck {
    pub fn ready(&self) -> bool {
        matches!(self, EntryCheck::Primed { blocked } if blocked.is_empty())
    }
}

/// Per-instrument entry signal memory.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalBank {
    set: IndicatorSet,
    primary: SignalState,
    secondaries: Vec<(SecondaryIndicator, SignalState)>,
    squeeze: SqueezeState,
    /// Last bar index committed by `evaluate_entry`.
    last_index: Option<usize>,
}

impl SignalBank {
    pub fn new(set: IndicatorSet) -> Self {
        let secondaries = set
            .secondaries
            .iter()
            .map(|s| (*s, SignalState::default()))
            .collect();
        Self {
            set,
            primary: SignalState::default(),
            secondaries,
            squeeze: SqueezeState::new(),
            last_index: None,
        }
    }

    pub fn set(&self) -> &IndicatorSet {
        &self.set
    }

    pub fn primary(&self) -> SignalState {
        self.primary
    }

    pub fn secondary(&self, kind: SecondaryIndicator) -> Option<SignalState> {
        self.secondaries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, s)| *s)
    }

    pub fn squeeze(&self) -> &SqueezeState {
        &self.squeeze
    }

    fn uses_squeeze(&self) -> bool {
        self.set
            .has_any(&[SecondaryIndicator::Squeeze, SecondaryIndicator::SqueezeSimple])
    }

    /// Squeeze confirmed on the last evaluated bar.
    pub fn squeeze_confirmed(&self) -> bool {
        self.set.has(SecondaryIndicator::Squeeze) && self.squeeze.signal.confirmed
    }

    #[cfg(test)]
    pub(crate) fn squeeze_mut(&mut self) -> &mut SqueezeState {
        &mut self.squeeze
    }

    /// Clear every entry flag. Squeeze counters keep running.
    pub fn reset(&mut self) {
        self.primary = SignalState::default();
        for (_, state) in &mut self.secondaries {
            *state = SignalState::default();
        }
        self.squeeze.signal.confirmed = false;
    }

    /// Consume this bar into the squeeze tracker. Idempotent per bar index.
    pub fn update_squeeze(&mut self, side: Side, view: &BarView<'_>, config: &EngineConfig) -> Result<(), DataError> {
        if !self.uses_squeeze() {
            return Ok(());
        }
        let band = |upper, lower| -> Result<(BandPair, BandPair), DataError> {
            let (cu, pu) = view.frame.pair(upper, view.index)?;
            let (cl, pl) = view.frame.pair(lower, view.index)?;
            Ok((BandPair { upper: cu, lower: cl }, BandPair { upper: pu, lower: pl }))
        };
        let (cur_band, prev_band) = band(SeriesKey::BbUpper, SeriesKey::BbLower)?;
        let (cur_channel, prev_channel) = band(SeriesKey::KcUpper, SeriesKey::KcLower)?;
        let roc = view.trailing(SeriesKey::Roc, config.squeeze.roc_count);
        self.squeeze = evaluate_squeeze(
            cur_band,
            prev_band,
            cur_channel,
            prev_channel,
            self.squeeze,
            &roc,
            &SqueezeParams::from_config(&config.squeeze),
            side,
            view.index,
        );
        Ok(())
    }

    /// Advance the primary and every secondary for an entry on `side`.
    ///
    /// Nothing is committed if any evaluator fails. On a jump or a cancel the
    /// bank is reset. An index already committed leaves the flags as they are.
    pub fn evaluate_entry(
        &mut self,
        side: Side,
        view: &BarView<'_>,
        config: &EngineConfig,
        natr: f64,
    ) -> Result<EntryCheck, DataError> {
        if self.last_index == Some(view.index) {
            return Ok(self.check());
        }
        let outcome = evaluate_primary(self.set.primary, side, view, config, self.primary)?;
        if outcome.opposite {
            self.reset();
            self.last_index = Some(view.index);
            return Ok(EntryCheck::Jump);
        }

        let updated = self
            .secondaries
            .iter()
            .map(|(kind, prior)| {
                evaluate_secondary(*kind, side, view, config, &self.squeeze, natr, *prior).map(|s| (*kind, s))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.last_index = Some(view.index);
        if outcome.cancelled {
            self.reset();
            return Ok(EntryCheck::Waiting);
        }
        self.primary = outcome.state;
        self.secondaries = updated;
        Ok(self.check())
    }

    /// Entry readiness from the committed flags.
    fn check(&self) -> EntryCheck {
        if !self.primary.confirmed {
            return EntryCheck::Waiting;
        }
        let blocked = self
            .secondaries
            .iter()
            .filter(|(_, s)| !s.confirmed)
            .map(|(k, _)| *k)
            .collect();
        EntryCheck::Primed { blocked }
    }
}

/// Exit signal memory of one open leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExitSignals {
    pub stochastic: SignalState,
    pub mesa: SignalState,
}

impl ExitSignals {
    /// Stochastic reversal exit for an open `side` leg. Reads the StochMFI
    /// lines when that is the primary, StochRSI otherwise.
    pub fn stochastic_exit(
        &mut self,
        primary: PrimaryIndicator,
        side: Side,
        view: &BarView<'_>,
        config: &EngineConfig,
    ) -> Result<bool, DataError> {
        let (k, d) = match primary {
            PrimaryIndicator::StochMfi => (SeriesKey::StochMfiK, SeriesKey::StochMfiD),
            _ => (SeriesKey::StochRsiK, SeriesKey::StochRsiD),
        };
        let (cur_k, prev_k) = view.frame.pair(k, view.index)?;
        let (cur_d, prev_d) = view.frame.pair(d, view.index)?;
        let input = StochInput {
            cur_k,
            cur_d,
            prev_k,
            prev_d,
        };
        let params = StochParams::from_config(&config.stochastic);
        let (state, fire) = evaluate_stochastic_exit(side, input, &params, self.stochastic);
        self.stochastic = state;
        Ok(fire)
    }

    /// MESA sine crossing against an open `side` leg. Fires on the bar of the cross.
    pub fn mesa_sine_exit(&mut self, side: Side, view: &BarView<'_>, config: &EngineConfig) -> Result<bool, DataError> {
        let state = secondary::mesa_sine_cross(side.opposite(), view, config.mesa.sine_strict, self.mesa)?;
        let fired = state.confirmed && !self.mesa.confirmed;
        self.mesa = state;
        Ok(fired)
    }
}
