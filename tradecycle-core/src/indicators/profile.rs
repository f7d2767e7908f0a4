//! Volume profile and value area.
//!
//! Each bar's volume is spread evenly over the price bins its range covers.
//! The value area grows outward from the point of control, always taking the
//! heavier neighbour, until it holds 70% of the session volume.

use crate::context::ValueArea;
use crate::domain::Bar;

pub const VALUE_AREA_SHARE: f64 = 0.70;

/// Bins are capped so a tiny tick over a wide range cannot allocate unbounded memory.
const MAX_BINS: usize = 20_000;

pub fn value_area(bars: &[Bar], tick_size: f64) -> Option<ValueArea> {
    if !(tick_size > 0.0) {
        return None;
    }
    let sane: Vec<&Bar> = bars.iter().filter(|b| b.is_sane()).collect();
    if sane.is_empty() {
        return None;
    }
    let lo = sane.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let hi = sane.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);

    let mut tick = tick_size;
    while ((hi - lo) / tick).ceil() as usize + 1 > MAX_BINS {
        tick *= 10.0;
    }
    let bins = ((hi - lo) / tick).ceil() as usize + 1;
    let bin_of = |price: f64| (((price - lo) / tick).round() as usize).min(bins - 1);

    let mut volume = vec![0.0; bins];
    for bar in &sane {
        let (a, b) = (bin_of(bar.low), bin_of(bar.high));
        let share = bar.volume as f64 / (b - a + 1) as f64;
        for v in &mut volume[a..=b] {
            *v += share;
        }
    }
    let total: f64 = volume.iter().sum();

    // First maximum wins ties.
    let poc = volume
        .iter()
        .enumerate()
        .fold(0, |best, (i, v)| if *v > volume[best] { i } else { best });

    let (mut low_bin, mut high_bin) = (poc, poc);
    let mut acc = volume[poc];
    while acc < total * VALUE_AREA_SHARE && (low_bin > 0 || high_bin < bins - 1) {
        let below = if low_bin > 0 { volume[low_bin - 1] } else { -1.0 };
        let above = if high_bin < bins - 1 { volume[high_bin + 1] } else { -1.0 };
        if above >= below {
            high_bin += 1;
            acc += above;
        } else {
            low_bin -= 1;
            acc += below;
        }
    }

    let price_at = |bin: usize| lo + bin as f64 * tick;
    Some(ValueArea {
        low: price_at(low_bin),
        high: price_at(high_bin),
        poc: price_at(poc),
    })
}
