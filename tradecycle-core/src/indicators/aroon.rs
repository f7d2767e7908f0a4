//! Aroon oscillator: Aroon Up minus Aroon Down.
//!
//! Aroon Up = 100 * (period - bars_since_highest_high) / period
//! Aroon Down = 100 * (period - bars_since_lowest_low) / period
//! Range [-100, 100]. Lookback: period.

use crate::adapter::Indicator;
use crate::domain::Bar;

/// Bars since the extreme in `window`; ties resolve to the most recent bar.
fn bars_since(window: &[Bar], pick_high: bool) -> usize {
    let mut best = if pick_high {
        f64::NEG_INFINITY
    } else {
        f64::INFINITY
    };
    let mut best_offset = 0;
    for (j, bar) in window.iter().enumerate() {
        let hit = if pick_high {
            bar.high >= best
        } else {
            bar.low <= best
        };
        if hit {
            best = if pick_high { bar.high } else { bar.low };
            best_offset = j;
        }
    }
    window.len() - 1 - best_offset
}

pub fn aroon_osc_series(bars: &[Bar], period: usize) -> Vec<f64> {
    let n = bars.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n <= period {
        return result;
    }
    let p = period as f64;
    for i in period..n {
        let window = &bars[i - period..=i];
        if window.iter().any(|b| b.high.is_nan() || b.low.is_nan()) {
            continue;
        }
        let up = 100.0 * (p - bars_since(window, true) as f64) / p;
        let down = 100.0 * (p - bars_since(window, false) as f64) / p;
        result[i] = up - down;
    }
    result
}

#[derive(Debug, Clone)]
pub struct AroonOsc {
    period: usize,
    name: String,
}

impl AroonOsc {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "Aroon period must be >= 1");
        Self {
            period,
            name: format!("aroonosc_{period}"),
        }
    }
}

impl Indicator for AroonOsc {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        aroon_osc_series(bars, self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_ohlc_bars, DEFAULT_EPSILON};

    #[test]
    fn new_high_and_old_low_is_plus_100() {
        let bars = make_ohlc_bars(&[
            (9.0, 10.0, 8.0, 9.5),
            (9.5, 11.0, 9.0, 10.5),
            (10.5, 12.0, 10.0, 11.5),
            (11.5, 13.0, 11.0, 12.5),
        ]);
        let osc = AroonOsc::new(3).compute(&bars);
        assert!(osc[2].is_nan());
        assert_approx(osc[3], 100.0, DEFAULT_EPSILON);
    }

    #[test]
    fn new_low_and_old_high_is_minus_100() {
        let bars = make_ohlc_bars(&[
            (19.0, 20.0, 18.0, 19.5),
            (17.0, 18.0, 16.0, 17.0),
            (15.0, 16.0, 14.0, 15.0),
            (13.0, 14.0, 12.0, 13.0),
        ]);
        let osc = AroonOsc::new(3).compute(&bars);
        assert_approx(osc[3], -100.0, DEFAULT_EPSILON);
    }

    #[test]
    fn bounded() {
        let bars = make_ohlc_bars(&[
            (10.0, 15.0, 5.0, 12.0),
            (12.0, 14.0, 8.0, 10.0),
            (10.0, 16.0, 7.0, 13.0),
            (13.0, 13.5, 9.0, 11.0),
            (11.0, 17.0, 6.0, 14.0),
        ]);
        let osc = AroonOsc::new(3).compute(&bars);
        for v in &osc[3..] {
            assert!((-100.0..=100.0).contains(v));
        }
    }
}
