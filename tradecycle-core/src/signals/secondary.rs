//! Secondary entry gates.
//!
//! Each evaluator reads one bar of the indicator frame and returns the next
//! `SignalState` for the gate; `confirmed` is what the entry fusion reads.
//! Flags are sticky where the gate tracks a crossover and recomputed every
//! bar otherwise. Long and short mirror each other.

use super::pattern::{evaluate_pattern, PatternSignal};
use super::squeeze::{roc_agrees, SqueezeState};
use super::stochastic::{evaluate_stochastic, stochastic_cancelled, StochInput, StochParams};
use super::trend_stack::{evaluate_trend_stack, Affinity};
use super::SignalState;
use crate::adapter::{IndicatorFrame, SeriesKey};
use crate::config::{EngineConfig, SecondaryIndicator};
use crate::domain::Side;
use crate::error::DataError;

/// What an evaluator may look at for one bar.
#[derive(Debug, Clone, Copy)]
pub struct BarView<'a> {
    pub frame: &'a IndicatorFrame,
    pub index: usize,
    /// Close of the raw (not Heikin-Ashi) bar.
    pub close: f64,
    pub pattern: Option<PatternSignal>,
}

impl BarView<'_> {
    fn value(&self, key: SeriesKey) -> Result<f64, DataError> {
        self.frame.value(key, self.index)
    }

    fn pair(&self, key: SeriesKey) -> Result<(f64, f64), DataError> {
        self.frame.pair(key, self.index)
    }

    /// The last `count` values of `key` ending at this bar, oldest first.
    pub fn trailing(&self, key: SeriesKey, count: usize) -> Vec<f64> {
        let start = (self.index + 1).saturating_sub(count);
        (start..=self.index)
            .map(|i| self.frame.value_or_nan(key, i))
            .collect()
    }
}

fn affinity(side: Side) -> Affinity {
    match side {
        Side::Long => Affinity::Bull,
        Side::Short => Affinity::Bear,
    }
}

fn gate(confirmed: bool) -> SignalState {
    SignalState {
        raw: confirmed,
        confirmed,
        ..Default::default()
    }
}

/// Oscillator crossing back out of its extreme zone, cancelled at `cancel`.
#[allow(clippy::too_many_arguments)]
fn zone_exit(side: Side, cur: f64, prev: f64, low: f64, high: f64, cancel_long: f64, cancel_short: f64, prior: SignalState) -> SignalState {
    let mut state = prior;
    match side {
        Side::Long => {
            if cur >= cancel_long {
                state.confirmed = false;
            } else if prev > low && cur < low {
                state.confirmed = false;
            } else if prev < low && cur >= low {
                state.confirmed = true;
            }
        }
        Side::Short => {
            if cur <= cancel_short {
                state.confirmed = false;
            } else if prev < high && cur > high {
                state.confirmed = false;
            } else if prev > high && cur <= high {
                state.confirmed = true;
            }
        }
    }
    state.raw = state.confirmed;
    state
}

/// Tracks which of two lines crossed above the other most recently.
/// `crossover` means the side's line (first argument for longs) is on top
/// after a fresh cross.
fn track_crossover(side: Side, cur_a: f64, prev_a: f64, cur_b: f64, prev_b: f64, prior: bool) -> bool {
    let (cur_x, prev_x, cur_y, prev_y) = match side {
        Side::Long => (cur_a, prev_a, cur_b, prev_b),
        Side::Short => (cur_b, prev_b, cur_a, prev_a),
    };
    if prev_x < prev_y && cur_x > cur_y {
        true
    } else if prev_x > prev_y && cur_x < cur_y {
        false
    } else {
        prior
    }
}

/// MESA sine crossing its lead line toward `side`. Sticky until the opposite cross.
pub fn mesa_sine_cross(side: Side, view: &BarView<'_>, strict: bool, prior: SignalState) -> Result<SignalState, DataError> {
    let (sine, prev_sine) = view.pair(SeriesKey::Sine)?;
    let (lead, prev_lead) = view.pair(SeriesKey::Lead)?;
    let mut state = prior;
    let cross_up = prev_sine <= prev_lead && sine > lead;
    let cross_down = prev_sine >= prev_lead && sine < lead;
    let (toward, away, deep) = match side {
        Side::Long => (cross_up, cross_down, prev_sine < -0.5),
        Side::Short => (cross_down, cross_up, prev_sine > 0.5),
    };
    if toward && (!strict || deep) {
        state.crossover = true;
    } else if away {
        state.crossover = false;
    }
    state.raw = state.crossover;
    state.confirmed = state.crossover;
    Ok(state)
}

/// MAMA above FAMA for longs (below for shorts), optionally only after a fresh cross.
pub fn mama_fama_order(side: Side, view: &BarView<'_>, require_crossover: bool, prior: SignalState) -> Result<SignalState, DataError> {
    let (mama, prev_mama) = view.pair(SeriesKey::Mama)?;
    let (fama, prev_fama) = view.pair(SeriesKey::Fama)?;
    let mut state = prior;
    state.crossover = track_crossover(side, mama, prev_mama, fama, prev_fama, state.crossover);
    let ordered = side.sign() * (mama - fama) > 0.0;
    state.raw = ordered;
    state.confirmed = ordered && (!require_crossover || state.crossover);
    Ok(state)
}

/// Entry stacked moving averages ordered toward `side`.
pub fn stacked_ma(side: Side, view: &BarView<'_>, count: usize, key: fn(usize) -> SeriesKey) -> Result<bool, DataError> {
    let values = (0..count)
        .map(|i| view.value(key(i)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(evaluate_trend_stack(&values, affinity(side)))
}

/// Sticky stochastic entry on a K/D pair, reset when cancelled.
fn stochastic_gate(
    side: Side,
    view: &BarView<'_>,
    k: SeriesKey,
    d: SeriesKey,
    config: &EngineConfig,
    prior: SignalState,
) -> Result<SignalState, DataError> {
    let (cur_k, prev_k) = view.pair(k)?;
    let (cur_d, prev_d) = view.pair(d)?;
    let params = StochParams::from_config(&config.stochastic);
    let input = StochInput {
        cur_k,
        cur_d,
        prev_k,
        prev_d,
    };
    let state = evaluate_stochastic(side, input, &params, prior);
    if stochastic_cancelled(side, cur_k, cur_d, config.stochastic.cancel_long, config.stochastic.cancel_short) {
        return Ok(SignalState::default());
    }
    Ok(state)
}

/// Advance one secondary gate by one bar.
///
/// `squeeze` must already hold this bar's squeeze update.
pub fn evaluate_secondary(
    kind: SecondaryIndicator,
    side: Side,
    view: &BarView<'_>,
    config: &EngineConfig,
    squeeze: &SqueezeState,
    natr: f64,
    prior: SignalState,
) -> Result<SignalState, DataError> {
    let p = &config.indicators;
    let sign = side.sign();
    let state = match kind {
        SecondaryIndicator::Rsi => {
            let (cur, prev) = view.pair(SeriesKey::Rsi)?;
            zone_exit(side, cur, prev, p.rsi_low_limit, p.rsi_high_limit, p.rsi_cancel_long, p.rsi_cancel_short, prior)
        }
        SecondaryIndicator::RsiSimple => {
            let cur = view.value(SeriesKey::Rsi)?;
            gate(match side {
                Side::Long => cur < p.rsi_low_limit,
                Side::Short => cur > p.rsi_high_limit,
            })
        }
        SecondaryIndicator::Mfi => {
            let (cur, prev) = view.pair(SeriesKey::Mfi)?;
            zone_exit(side, cur, prev, p.mfi_low_limit, p.mfi_high_limit, p.mfi_cancel_long, p.mfi_cancel_short, prior)
        }
        SecondaryIndicator::MfiSimple => {
            let cur = view.value(SeriesKey::Mfi)?;
            gate(match side {
                Side::Long => cur < p.mfi_low_limit,
                Side::Short => cur > p.mfi_high_limit,
            })
        }
        SecondaryIndicator::Adx => gate(view.value(SeriesKey::Adx)? >= p.adx_threshold),
        SecondaryIndicator::Dmi | SecondaryIndicator::DmiSimple => {
            let (plus, prev_plus) = view.pair(SeriesKey::PlusDi)?;
            let (minus, prev_minus) = view.pair(SeriesKey::MinusDi)?;
            let mut state = prior;
            state.crossover = track_crossover(side, plus, prev_plus, minus, prev_minus, state.crossover);
            state.raw = sign * (plus - minus) > 0.0;
            let simple = kind == SecondaryIndicator::DmiSimple;
            let adx_ok = !p.dmi_with_adx || view.value(SeriesKey::Adx)? >= p.adx_threshold;
            state.confirmed = state.raw && (simple || state.crossover) && adx_ok;
            state
        }
        SecondaryIndicator::AroonOsc | SecondaryIndicator::AroonOscSimple => {
            let simple = kind == SecondaryIndicator::AroonOscSimple;
            let key = if simple && natr > p.aroonosc_alt_natr {
                SeriesKey::AroonOscAlt
            } else {
                SeriesKey::AroonOsc
            };
            let (cur, prev) = view.pair(key)?;
            let (cur, prev) = (sign * cur, sign * prev);
            let mut state = prior;
            if cur < p.aroonosc_threshold {
                state.confirmed = false;
            }
            if cur > p.aroonosc_threshold && (simple || prev < 0.0) {
                state.confirmed = true;
            }
            state.raw = state.confirmed;
            state
        }
        SecondaryIndicator::Macd | SecondaryIndicator::MacdSimple => {
            let (macd, prev_macd) = view.pair(SeriesKey::Macd)?;
            let (signal, prev_signal) = view.pair(SeriesKey::MacdSignal)?;
            let mut state = prior;
            state.crossover = track_crossover(side, macd, prev_macd, signal, prev_signal, state.crossover);
            let gap = sign * (macd - signal);
            state.raw = gap > 0.0;
            let simple = kind == SecondaryIndicator::MacdSimple;
            state.confirmed = gap > 0.0 && gap > p.macd_offset && (simple || state.crossover);
            state
        }
        SecondaryIndicator::Vwap => {
            let vwap = view.value(SeriesKey::Vwap)?;
            gate(sign * (vwap - view.close) > 0.0)
        }
        SecondaryIndicator::Vpt => {
            let (vpt, prev_vpt) = view.pair(SeriesKey::Vpt)?;
            let (sma, prev_sma) = view.pair(SeriesKey::VptSma)?;
            let mut state = prior;
            if sign * (prev_vpt - prev_sma) < 0.0 && sign * (vpt - sma) > 0.0 {
                state.confirmed = true;
            } else if sign * (vpt - sma) < 0.0 {
                state.confirmed = false;
            }
            state.raw = state.confirmed;
            state
        }
        SecondaryIndicator::Chop => {
            let (cur, prev) = view.pair(SeriesKey::Chop)?;
            let mut state = prior;
            if prev >= p.chop_high_limit && cur < p.chop_high_limit {
                state.confirmed = true;
            } else if cur >= p.chop_high_limit || cur < p.chop_low_limit {
                state.confirmed = false;
            }
            state.raw = state.confirmed;
            state
        }
        SecondaryIndicator::ChopSimple => gate(view.value(SeriesKey::Chop)? < p.chop_high_limit),
        SecondaryIndicator::Supertrend => {
            let line = view.value(SeriesKey::Supertrend)?;
            gate(sign * (view.close - line) > 0.0)
        }
        SecondaryIndicator::Squeeze => squeeze.signal,
        SecondaryIndicator::SqueezeSimple => {
            let roc = view.trailing(SeriesKey::Roc, config.squeeze.roc_count);
            gate(squeeze.signal.raw && roc_agrees(&roc, config.squeeze.roc_count, side))
        }
        SecondaryIndicator::StackedMa => gate(stacked_ma(side, view, config.stacked_ma.periods.len(), SeriesKey::StackedMa)?),
        SecondaryIndicator::MamaFama => mama_fama_order(side, view, config.mesa.mama_require_crossover, prior)?,
        SecondaryIndicator::MesaSine => mesa_sine_cross(side, view, config.mesa.sine_strict, prior)?,
        SecondaryIndicator::Roc => {
            let (cur, prev) = view.pair(SeriesKey::Roc)?;
            gate(sign * cur > 0.0 && sign * (cur - prev) > 0.0)
        }
        SecondaryIndicator::StochMfi => {
            stochastic_gate(side, view, SeriesKey::StochMfiK, SeriesKey::StochMfiD, config, prior)?
        }
        SecondaryIndicator::StochRsiHtf => {
            stochastic_gate(side, view, SeriesKey::HtfStochK, SeriesKey::HtfStochD, config, prior)?
        }
        SecondaryIndicator::Trend => gate(sign * view.value(SeriesKey::TtmTrend)? > 0.0),
        SecondaryIndicator::Pattern => evaluate_pattern(side, view.pattern, config.external.pattern_min_rank),
    };
    Ok(state)
}
