//! Primary entry indicators.
//!
//! The primary decides both whether an entry on the current side is set up
//! and whether the market already shows a setup for the opposite side, in
//! which case the machine jumps sides without acting.

use super::secondary::{mama_fama_order, mesa_sine_cross, stacked_ma, BarView};
use super::stochastic::{evaluate_stochastic, opposite_setup, stochastic_cancelled, StochInput, StochParams};
use super::trend_stack::{evaluate_trend_stack, Affinity};
use super::SignalState;
use crate::adapter::SeriesKey;
use crate::config::{EngineConfig, PrimaryIndicator};
use crate::domain::Side;
use crate::error::DataError;

/// Result of one primary evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PrimaryOutcome {
    pub state: SignalState,
    /// The opposite side is set up; the caller resets and switches sides.
    pub opposite: bool,
    /// The setup was abandoned; the caller resets every signal.
    pub cancelled: bool,
}

fn stochastic_primary(
    side: Side,
    view: &BarView<'_>,
    k: SeriesKey,
    d: SeriesKey,
    config: &EngineConfig,
    prior: SignalState,
) -> Result<PrimaryOutcome, DataError> {
    let (cur_k, prev_k) = view.frame.pair(k, view.index)?;
    let (cur_d, prev_d) = view.frame.pair(d, view.index)?;
    let params = StochParams::from_config(&config.stochastic);
    if opposite_setup(side, cur_k, cur_d, &params) {
        return Ok(PrimaryOutcome {
            state: prior,
            opposite: true,
            cancelled: false,
        });
    }
    let input = StochInput {
        cur_k,
        cur_d,
        prev_k,
        prev_d,
    };
    let state = evaluate_stochastic(side, input, &params, prior);
    let cancelled = stochastic_cancelled(
        side,
        cur_k,
        cur_d,
        config.stochastic.cancel_long,
        config.stochastic.cancel_short,
    );
    Ok(PrimaryOutcome {
        state,
        opposite: false,
        cancelled,
    })
}

/// Evaluate `primary` for an entry on `side`.
pub fn evaluate_primary(
    primary: PrimaryIndicator,
    side: Side,
    view: &BarView<'_>,
    config: &EngineConfig,
    prior: SignalState,
) -> Result<PrimaryOutcome, DataError> {
    let flat = |state: SignalState, opposite: bool| PrimaryOutcome {
        state,
        opposite,
        cancelled: false,
    };
    let gate = |confirmed: bool| SignalState {
        raw: confirmed,
        confirmed,
        ..Default::default()
    };

    match primary {
        PrimaryIndicator::StochRsi => {
            stochastic_primary(side, view, SeriesKey::StochRsiK, SeriesKey::StochRsiD, config, prior)
        }
        PrimaryIndicator::StochMfi => {
            stochastic_primary(side, view, SeriesKey::StochMfiK, SeriesKey::StochMfiD, config, prior)
        }
        PrimaryIndicator::StackedMa => {
            let count = config.stacked_ma.periods.len();
            let toward = stacked_ma(side, view, count, SeriesKey::StackedMa)?;
            let away = stacked_ma(side.opposite(), view, count, SeriesKey::StackedMa)?;
            Ok(flat(gate(toward), away))
        }
        PrimaryIndicator::AroonOsc => {
            let osc = side.sign() * view.frame.value(SeriesKey::AroonOsc, view.index)?;
            let threshold = config.indicators.aroonosc_threshold;
            Ok(flat(gate(osc > threshold), osc < -threshold))
        }
        PrimaryIndicator::MamaFama => {
            let require = config.mesa.mama_require_crossover;
            let state = mama_fama_order(side, view, require, prior)?;
            let against = mama_fama_order(side.opposite(), view, require, SignalState::default())?;
            Ok(flat(state, against.raw))
        }
        PrimaryIndicator::MesaSine => {
            let strict = config.mesa.sine_strict;
            let state = mesa_sine_cross(side, view, strict, prior)?;
            let against = mesa_sine_cross(side.opposite(), view, strict, SignalState::default())?;
            Ok(flat(state, against.confirmed))
        }
        PrimaryIndicator::Breadth => {
            let (cur, prev) = view.frame.pair(SeriesKey::Breadth, view.index)?;
            let ext = &config.external;
            let mut state = prior;
            let (in_zone, turned, opposite) = match side {
                Side::Long => (cur >= ext.breadth_oversold, cur < prev, cur <= ext.breadth_overbought),
                Side::Short => (cur <= ext.breadth_overbought, cur > prev, cur >= ext.breadth_oversold),
            };
            if in_zone {
                state.raw = true;
            }
            if state.raw && turned {
                state.confirmed = true;
            }
            Ok(flat(state, opposite))
        }
        PrimaryIndicator::RelativeStrength => {
            let len = config.external.rs_stack_len;
            // Newest first; a gap inside the window is missing data, not weakness.
            let start = (view.index + 1).saturating_sub(len);
            let recent = (start..=view.index)
                .rev()
                .map(|i| view.frame.value(SeriesKey::RelativeStrength, i))
                .collect::<Result<Vec<f64>, _>>()?;
            let newest = recent.first().copied().unwrap_or(f64::NAN);
            let full = recent.len() == len;
            let strong = |s: Side| match config.external.min_rs {
                Some(min) => s.sign() * newest >= min,
                None => true,
            };
            let bull = full && evaluate_trend_stack(&recent, Affinity::Bull);
            let bear = full && evaluate_trend_stack(&recent, Affinity::Bear);
            let (toward, away) = match side {
                Side::Long => (bull && strong(Side::Long), bear && strong(Side::Short)),
                Side::Short => (bear && strong(Side::Short), bull && strong(Side::Long)),
            };
            Ok(flat(gate(toward), away))
        }
    }
}
