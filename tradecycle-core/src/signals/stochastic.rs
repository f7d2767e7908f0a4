//! Stochastic family evaluator (StochRSI, StochMFI, higher-timeframe StochRSI).
//!
//! Long side: the oscillator must first sink below the low limit (raw). An
//! entry is then confirmed by either a K-over-D crossover inside the oversold
//! zone or K climbing back through the default low limit, provided the K/D
//! gap is at least `offset`. The short side mirrors every comparison.

use super::SignalState;
use crate::config::StochasticConfig;
use crate::domain::Side;

/// Fixed zone boundaries the threshold and exit rules use regardless of the
/// configured entry limits.
pub const DEFAULT_LOW_LIMIT: f64 = 20.0;
pub const DEFAULT_HIGH_LIMIT: f64 = 80.0;

/// K/D for the current and previous bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StochInput {
    pub cur_k: f64,
    pub cur_d: f64,
    pub prev_k: f64,
    pub prev_d: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StochParams {
    pub low_limit: f64,
    pub high_limit: f64,
    pub default_low: f64,
    pub default_high: f64,
    pub offset: f64,
    pub no_crossover: bool,
    pub crossover_only: bool,
}

impl StochParams {
    pub fn from_config(config: &StochasticConfig) -> Self {
        Self {
            low_limit: config.low_limit,
            high_limit: config.high_limit,
            default_low: DEFAULT_LOW_LIMIT,
            default_high: DEFAULT_HIGH_LIMIT,
            offset: config.offset,
            no_crossover: config.no_crossover,
            crossover_only: config.crossover_only,
        }
    }
}

/// Update the sticky stochastic entry flags for one bar.
pub fn evaluate_stochastic(
    side: Side,
    input: StochInput,
    params: &StochParams,
    prior: SignalState,
) -> SignalState {
    let StochInput {
        cur_k,
        cur_d,
        prev_k,
        prev_d,
    } = input;
    let mut state = prior;

    match side {
        Side::Long => {
            if cur_k < params.low_limit && cur_d < params.low_limit {
                state.raw = true;
                if prev_k < prev_d && cur_k >= cur_d {
                    state.crossover = true;
                }
            }
            if state.crossover && prev_k > prev_d && cur_k <= cur_d {
                state.crossover = false;
            }
            if state.raw && prev_k < params.default_low && cur_k > prev_k && cur_k >= params.default_low {
                state.threshold = true;
            }
        }
        Side::Short => {
            if cur_k > params.high_limit && cur_d > params.high_limit {
                state.raw = true;
                if prev_k > prev_d && cur_k <= cur_d {
                    state.crossover = true;
                }
            }
            if state.crossover && prev_k < prev_d && cur_k >= cur_d {
                state.crossover = false;
            }
            if state.raw && prev_k > params.default_high && cur_k < prev_k && cur_k <= params.default_high {
                state.threshold = true;
            }
        }
    }

    if state.raw {
        let armed = (state.crossover && !params.no_crossover) || (state.threshold && !params.crossover_only);
        let gap = side.sign() * (cur_k - cur_d);
        if armed && gap >= params.offset {
            state.confirmed = true;
        }
    }
    state
}

/// K and D have wandered far enough from the setup zone to abandon it.
pub fn stochastic_cancelled(side: Side, cur_k: f64, cur_d: f64, cancel_long: f64, cancel_short: f64) -> bool {
    match side {
        Side::Long => cur_k >= cancel_long && cur_d >= cancel_long,
        Side::Short => cur_k <= cancel_short && cur_d <= cancel_short,
    }
}

/// K and D already sit in the opposite zone: a setup for the other side.
pub fn opposite_setup(side: Side, cur_k: f64, cur_d: f64, params: &StochParams) -> bool {
    match side {
        Side::Long => cur_k >= params.default_high && cur_d >= params.default_high,
        Side::Short => cur_k <= params.default_low && cur_d <= params.default_low,
    }
}

/// Reversal exit for an open position on `side`.
///
/// Arms once K and D pass the default opposite limit, then fires on a K/D
/// cross in that zone or on K falling back through the limit. Returns the
/// updated state and whether the exit fired.
pub fn evaluate_stochastic_exit(side: Side, input: StochInput, params: &StochParams, prior: SignalState) -> (SignalState, bool) {
    let StochInput {
        cur_k,
        cur_d,
        prev_k,
        prev_d,
    } = input;
    let mut state = prior;
    let mut fire = false;
    match side {
        Side::Long => {
            if cur_k > params.default_high && cur_d > params.default_high {
                state.raw = true;
                if prev_k > prev_d && cur_k <= cur_d {
                    fire = true;
                }
            }
            if state.raw && prev_k > params.default_high && cur_k <= params.default_high {
                fire = true;
            }
        }
        Side::Short => {
            if cur_k < params.default_low && cur_d < params.default_low {
                state.raw = true;
                if prev_k < prev_d && cur_k >= cur_d {
                    fire = true;
                }
            }
            if state.raw && prev_k < params.default_low && cur_k >= params.default_low {
                fire = true;
            }
        }
    }
    state.confirmed = fire;
    (state, fire)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(offset: f64) -> StochParams {
        StochParams {
            low_limit: 20.0,
            high_limit: 80.0,
            default_low: 20.0,
            default_high: 80.0,
            offset,
            no_crossover: false,
            crossover_only: false,
        }
    }

    fn input(prev_k: f64, prev_d: f64, cur_k: f64, cur_d: f64) -> StochInput {
        StochInput {
            cur_k,
            cur_d,
            prev_k,
            prev_d,
        }
    }

    #[test]
    fn threshold_break_confirms_long() {
        let p = params(0.0);
        // K 12 -> 15 with D 18: oversold, no crossover yet.
        let s1 = evaluate_stochastic(Side::Long, input(12.0, 18.0, 15.0, 18.0), &p, SignalState::default());
        assert!(s1.raw);
        assert!(!s1.confirmed);
        // K 15 -> 25 with D 18: K climbs back through 20.
        let s2 = evaluate_stochastic(Side::Long, input(15.0, 18.0, 25.0, 18.0), &p, s1);
        assert!(s2.threshold);
        assert!(s2.confirmed);
    }

    #[test]
    fn offset_blocks_weak_gap() {
        let p = params(10.0);
        let prior = SignalState {
            raw: true,
            ..Default::default()
        };
        let s = evaluate_stochastic(Side::Long, input(15.0, 18.0, 25.0, 18.0), &p, prior);
        assert!(s.threshold);
        assert!(!s.confirmed);
    }

    #[test]
    fn crossover_inside_zone_and_cancellation() {
        let p = params(0.0);
        let s = evaluate_stochastic(Side::Long, input(10.0, 12.0, 13.0, 12.0), &p, SignalState::default());
        assert!(s.raw && s.crossover && s.confirmed);

        let mut p_only = p;
        p_only.no_crossover = true;
        let s = evaluate_stochastic(Side::Long, input(10.0, 12.0, 13.0, 12.0), &p_only, SignalState::default());
        assert!(s.crossover);
        assert!(!s.confirmed);

        // K drops back under D: crossover cancelled.
        let prior = SignalState {
            raw: true,
            crossover: true,
            ..Default::default()
        };
        let s = evaluate_stochastic(Side::Long, input(14.0, 12.0, 11.0, 12.0), &p_only, prior);
        assert!(!s.crossover);
    }

    #[test]
    fn short_side_mirrors() {
        let p = params(0.0);
        let s1 = evaluate_stochastic(Side::Short, input(88.0, 82.0, 85.0, 82.0), &p, SignalState::default());
        assert!(s1.raw);
        let s2 = evaluate_stochastic(Side::Short, input(85.0, 82.0, 75.0, 82.0), &p, s1);
        assert!(s2.threshold && s2.confirmed);
    }

    #[test]
    fn no_raw_no_confirmation() {
        let p = params(0.0);
        let s = evaluate_stochastic(Side::Long, input(15.0, 18.0, 25.0, 18.0), &p, SignalState::default());
        assert_eq!(s, SignalState::default());
    }

    #[test]
    fn cancel_and_opposite_setup() {
        assert!(stochastic_cancelled(Side::Long, 41.0, 40.0, 40.0, 60.0));
        assert!(!stochastic_cancelled(Side::Long, 41.0, 39.0, 40.0, 60.0));
        assert!(stochastic_cancelled(Side::Short, 59.0, 60.0, 40.0, 60.0));
        let p = params(0.0);
        assert!(opposite_setup(Side::Long, 85.0, 81.0, &p));
        assert!(opposite_setup(Side::Short, 10.0, 19.0, &p));
        assert!(!opposite_setup(Side::Short, 10.0, 21.0, &p));
    }

    #[test]
    fn exit_fires_on_overbought_cross() {
        let p = params(0.0);
        let (s, fire) = evaluate_stochastic_exit(Side::Long, input(90.0, 85.0, 86.0, 87.0), &p, SignalState::default());
        assert!(s.raw);
        assert!(fire);
        let (s, fire) = evaluate_stochastic_exit(Side::Long, input(85.0, 82.0, 88.0, 84.0), &p, SignalState::default());
        assert!(s.raw);
        assert!(!fire);
        let (_, fire) = evaluate_stochastic_exit(Side::Long, input(88.0, 84.0, 79.0, 84.0), &p, s);
        assert!(fire);
    }
}
