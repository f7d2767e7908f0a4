//! Key support/resistance levels from fractal pivots on longer-timeframe bars.
//!
//! A support pivot is a low at or below its neighbours (five- or four-candle
//! fractal), a resistance pivot the mirror on highs. A new level is kept only
//! if it sits at least one ATR away from every level already found on the
//! same side. Touches count how many later levels fall within 1.5%.

use crate::context::KeyLevel;
use crate::domain::Bar;
use crate::indicators::atr::atr_series;

/// Levels within this percent of each other count as the same level.
pub const TOUCH_PCT: f64 = 1.5;

fn is_support(bars: &[Bar], i: usize) -> bool {
    let low = |k: usize| bars[k].low;
    let core = low(i) <= low(i - 1) && low(i) <= low(i + 1);
    let right = low(i + 1) <= low(i + 2);
    let left = low(i - 1) <= low(i - 2);
    core && (right || left)
}

fn is_resistance(bars: &[Bar], i: usize) -> bool {
    let high = |k: usize| bars[k].high;
    let core = high(i) >= high(i - 1) && high(i) >= high(i + 1);
    let right = high(i + 1) >= high(i + 2);
    let left = high(i - 1) >= high(i - 2);
    core && (right || left)
}

/// ATR from the bars before `i`, falling back to the mean range.
fn local_atr(bars: &[Bar], i: usize, atr_period: usize) -> f64 {
    let end = i.max(atr_period + 1).min(bars.len());
    atr_series(&bars[..end], atr_period)
        .last()
        .copied()
        .filter(|v| !v.is_nan())
        .unwrap_or_else(|| bars.iter().map(|b| b.high - b.low).sum::<f64>() / bars.len() as f64)
}

fn count_touches(levels: &[(f64, usize)]) -> Vec<(f64, usize, u32)> {
    levels
        .iter()
        .enumerate()
        .map(|(idx, &(lvl, at))| {
            let later = levels[idx + 1..]
                .iter()
                .filter(|(other, _)| (lvl / other - 1.0).abs() * 100.0 < TOUCH_PCT)
                .count() as u32;
            (lvl, at, 1 + later)
        })
        .collect()
}

/// Support and resistance levels, supports first, each in discovery order.
pub fn key_levels(bars: &[Bar], atr_period: usize) -> Vec<KeyLevel> {
    if bars.len() < 5 || atr_period == 0 {
        return Vec::new();
    }
    let mut support: Vec<(f64, usize)> = Vec::new();
    let mut resistance: Vec<(f64, usize)> = Vec::new();

    for i in 2..bars.len() - 2 {
        if is_support(bars, i) {
            let lvl = bars[i].low;
            let atr = local_atr(bars, i, atr_period);
            if support.iter().all(|(other, _)| (lvl - other).abs() >= atr) {
                support.push((lvl, i));
            }
        } else if is_resistance(bars, i) {
            let lvl = bars[i].high;
            let atr = local_atr(bars, i, atr_period);
            if resistance.iter().all(|(other, _)| (lvl - other).abs() >= atr) {
                resistance.push((lvl, i));
            }
        }
    }

    count_touches(&support)
        .into_iter()
        .chain(count_touches(&resistance))
        .map(|(price, at, touches)| KeyLevel {
            price,
            timestamp: bars[at].timestamp,
            touches,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_ohlc_bars;

    #[test]
    fn finds_a_v_bottom_and_a_peak() {
        let bars = make_ohlc_bars(&[
            (105.0, 106.0, 104.0, 105.0),
            (104.0, 105.0, 102.0, 103.0),
            (101.0, 102.0, 100.0, 101.0),
            (103.0, 104.0, 102.0, 103.0),
            (105.0, 112.0, 104.0, 106.0),
            (104.0, 105.0, 103.0, 104.0),
            (102.0, 103.0, 101.0, 102.0),
        ]);
        let levels = key_levels(&bars, 2);
        assert!(levels.iter().any(|l| l.price == 100.0));
        assert!(levels.iter().any(|l| l.price == 112.0));
        assert!(levels.iter().all(|l| l.touches >= 1));
    }

    #[test]
    fn touches_count_later_levels_within_tolerance() {
        let counted = count_touches(&[(100.0, 0), (101.0, 5), (130.0, 9)]);
        assert_eq!(counted[0].2, 2);
        assert_eq!(counted[1].2, 1);
        assert_eq!(counted[2].2, 1);
    }

    #[test]
    fn too_few_bars() {
        let bars = make_ohlc_bars(&[(1.0, 2.0, 0.5, 1.5); 4]);
        assert!(key_levels(&bars, 2).is_empty());
    }
}
