//! Bollinger-inside-Keltner squeeze.
//!
//! The squeeze builds while the Bollinger band sits inside the Keltner
//! channel. Two entry triggers come out of it: the band narrowing back toward
//! the channel after a wide separation (threshold), and the band breaking out
//! of the channel (crossover). A breakout that lingers outside is tracked so
//! the exit policy can act on it.

use super::SignalState;
use crate::config::SqueezeConfig;
use crate::domain::Side;

/// Upper and lower line of a band or channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandPair {
    pub upper: f64,
    pub lower: f64,
}

impl BandPair {
    fn contains(&self, inner: &BandPair) -> bool {
        inner.upper <= self.upper && inner.lower >= self.lower
    }

    fn mid(&self) -> f64 {
        (self.upper + self.lower) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SqueezeParams {
    pub min_count: u32,
    /// Percent of the channel midline.
    pub offset: f64,
    pub crossover_only: bool,
    /// Trailing ROC values that must agree with the side.
    pub roc_count: usize,
    pub linger_limit: u32,
}

impl SqueezeParams {
    pub fn from_config(config: &SqueezeConfig) -> Self {
        Self {
            min_count: config.min_count,
            offset: config.offset,
            crossover_only: config.crossover_only,
            roc_count: config.roc_count,
            linger_limit: config.xover_exit_count,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqueezeState {
    pub signal: SignalState,
    /// Gap on the last consumed bar, NaN before the first.
    pub gap: f64,
    /// Widest gap seen during the current squeeze.
    pub max_gap: f64,
    pub last_index: Option<usize>,
}

impl PartialEq for SqueezeState {
    /// Gaps compare equal when both are NaN (nothing consumed yet).
    fn eq(&self, other: &Self) -> bool {
        let same = |a: f64, b: f64| a == b || (a.is_nan() && b.is_nan());
        self.signal == other.signal
            && same(self.gap, other.gap)
            && same(self.max_gap, other.max_gap)
            && self.last_index == other.last_index
    }
}

impl SqueezeState {
    pub fn new() -> Self {
        Self {
            gap: f64::NAN,
            ..Default::default()
        }
    }

    /// A breakout that has stayed outside the channel for at least `bars` bars.
    pub fn lingered(&self, bars: u32) -> bool {
        self.signal.crossover && self.signal.linger_count >= bars
    }
}

/// Smaller of the two inner distances, in percent of the channel midline.
fn gap_pct(band: &BandPair, channel: &BandPair) -> f64 {
    let mid = channel.mid();
    if mid == 0.0 {
        return 0.0;
    }
    (channel.upper - band.upper).min(band.lower - channel.lower) / mid * 100.0
}

/// Consume bar `index`. Consuming the same index twice returns `state` unchanged.
///
/// `roc` holds the trailing rate-of-change values, newest last.
#[allow(clippy::too_many_arguments)]
pub fn evaluate_squeeze(
    cur_band: BandPair,
    prev_band: BandPair,
    cur_channel: BandPair,
    prev_channel: BandPair,
    state: SqueezeState,
    roc: &[f64],
    params: &SqueezeParams,
    side: Side,
    index: usize,
) -> SqueezeState {
    if state.last_index == Some(index) {
        return state;
    }
    let mut next = state;
    next.last_index = Some(index);

    let inside = cur_channel.contains(&cur_band);
    let was_inside = prev_channel.contains(&prev_band);
    let gap = gap_pct(&cur_band, &cur_channel);
    let prev_gap = next.gap;
    next.gap = gap;

    let sig = &mut next.signal;
    sig.threshold = false;
    if inside {
        sig.squeeze_count += 1;
        next.max_gap = next.max_gap.max(gap);
        if sig.crossover {
            // Back inside after a breakout.
            sig.crossover = false;
            sig.linger_count = 0;
        }
    } else if was_inside && sig.squeeze_count >= params.min_count {
        sig.crossover = true;
        sig.linger_count = 0;
    } else if sig.crossover {
        sig.linger_count += 1;
        if sig.linger_count > params.linger_limit {
            sig.crossover = false;
        }
    }
    if !inside {
        sig.squeeze_count = 0;
        next.max_gap = 0.0;
    }

    sig.raw = sig.squeeze_count >= params.min_count;
    if sig.raw && next.max_gap >= params.offset && gap < prev_gap && gap <= params.offset {
        sig.threshold = true;
    }

    let armed = sig.crossover || (sig.threshold && !params.crossover_only);
    sig.confirmed = armed && roc_agrees(roc, params.roc_count, side);
    next
}

/// Every value present and on the side's sign (positive long, negative short).
pub fn roc_agrees(roc: &[f64], count: usize, side: Side) -> bool {
    if count == 0 {
        return true;
    }
    if roc.len() < count {
        return false;
    }
    roc[roc.len() - count..]
        .iter()
        .all(|v| !v.is_nan() && side.sign() * v > 0.0)
}
