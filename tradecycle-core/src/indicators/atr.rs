//! Average True Range and its normalized form.
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! ATR uses Wilder smoothing (alpha = 1/period), seeded from TR[1] onwards.
//! NATR = 100 * ATR / close.

use crate::adapter::Indicator;
use crate::domain::Bar;
use crate::indicators::ma::seeded_recursive;

/// True Range series. TR[0] is high-low (no previous close).
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        if i == 0 {
            tr.push(bar.high - bar.low);
            continue;
        }
        let pc = bars[i - 1].close;
        tr.push(
            (bar.high - bar.low)
                .max((bar.high - pc).abs())
                .max((bar.low - pc).abs()),
        );
    }
    tr
}

/// Wilder smoothing: seed = mean of the first `period` valid values, then
/// `s[t] = s[t-1] + (x[t] - s[t-1]) / period`.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 {
        return vec![f64::NAN; values.len()];
    }
    seeded_recursive(values, period, 1.0 / period as f64)
}

/// ATR with the first TR dropped so the seed uses proper true ranges.
pub fn atr_series(bars: &[Bar], period: usize) -> Vec<f64> {
    let mut tr = true_range(bars);
    if let Some(first) = tr.first_mut() {
        *first = f64::NAN;
    }
    wilder_smooth(&tr, period)
}

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    normalized: bool,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            normalized: false,
            name: format!("atr_{period}"),
        }
    }

    /// ATR as a percent of the close.
    pub fn normalized(period: usize) -> Self {
        assert!(period >= 1, "NATR period must be >= 1");
        Self {
            period,
            normalized: true,
            name: format!("natr_{period}"),
        }
    }
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let atr = atr_series(bars, self.period);
        if !self.normalized {
            return atr;
        }
        atr.iter()
            .zip(bars)
            .map(|(a, b)| if b.close == 0.0 { f64::NAN } else { 100.0 * a / b.close })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_ohlc_bars, DEFAULT_EPSILON};

    #[test]
    fn true_range_basic() {
        let bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0),
            (106.0, 107.0, 98.0, 99.0),
        ]);
        let tr = true_range(&bars);
        assert_approx(tr[0], 10.0, DEFAULT_EPSILON);
        assert_approx(tr[1], 8.0, DEFAULT_EPSILON);
        assert_approx(tr[2], 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let bars = make_ohlc_bars(&[(98.0, 102.0, 97.0, 100.0), (110.0, 115.0, 108.0, 112.0)]);
        assert_approx(true_range(&bars)[1], 15.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_period_3() {
        let bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0), // TR 8
            (106.0, 107.0, 98.0, 99.0),   // TR 9
            (99.0, 104.0, 97.0, 103.0),   // TR 7
            (103.0, 109.0, 103.0, 108.0), // TR 6
        ]);
        let atr = Atr::new(3).compute(&bars);
        assert!(atr[2].is_nan());
        assert_approx(atr[3], 8.0, DEFAULT_EPSILON);
        // 8 + (6 - 8) / 3
        assert_approx(atr[4], 8.0 - 2.0 / 3.0, DEFAULT_EPSILON);
    }

    #[test]
    fn natr_is_percent_of_close() {
        let bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0),
            (106.0, 107.0, 98.0, 99.0),
            (99.0, 104.0, 97.0, 100.0),
        ]);
        let natr = Atr::normalized(3).compute(&bars);
        assert_approx(natr[3], 8.0, DEFAULT_EPSILON);
    }
}
