//! SuperTrend: ATR band that flips between support and resistance.
//!
//! Output is the active band: the lower band (support) while trending up,
//! the upper band (resistance) while trending down. Inherently sequential.

use crate::adapter::Indicator;
use crate::domain::Bar;
use crate::indicators::atr::atr_series;

pub fn supertrend_series(bars: &[Bar], period: usize, multiplier: f64) -> Vec<f64> {
    let n = bars.len();
    let mut result = vec![f64::NAN; n];
    let atr = atr_series(bars, period);
    let start = match atr.iter().position(|v| !v.is_nan()) {
        Some(idx) => idx,
        None => return result,
    };

    let mut upper = bars[start].hl2() + multiplier * atr[start];
    let mut lower = bars[start].hl2() - multiplier * atr[start];
    let mut trending_up = true;
    result[start] = lower;

    for i in (start + 1)..n {
        if atr[i].is_nan() {
            return result;
        }
        let basic_upper = bars[i].hl2() + multiplier * atr[i];
        let basic_lower = bars[i].hl2() - multiplier * atr[i];
        let prev_close = bars[i - 1].close;
        // Bands only tighten while price respects them.
        upper = if prev_close <= upper {
            basic_upper.min(upper)
        } else {
            basic_upper
        };
        lower = if prev_close >= lower {
            basic_lower.max(lower)
        } else {
            basic_lower
        };

        if trending_up && bars[i].close < lower {
            trending_up = false;
        } else if !trending_up && bars[i].close > upper {
            trending_up = true;
        }
        result[i] = if trending_up { lower } else { upper };
    }
    result
}

#[derive(Debug, Clone)]
pub struct Supertrend {
    period: usize,
    multiplier: f64,
    name: String,
}

impl Supertrend {
    pub fn new(period: usize, multiplier: f64) -> Self {
        assert!(period >= 1, "SuperTrend period must be >= 1");
        Self {
            period,
            multiplier,
            name: format!("supertrend_{period}_{multiplier}"),
        }
    }
}

impl Indicator for Supertrend {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        supertrend_series(bars, self.period, self.multiplier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    #[test]
    fn uptrend_line_stays_below_price() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let bars = make_bars(&closes);
        let st = Supertrend::new(5, 3.0).compute(&bars);
        assert!(st[4].is_nan());
        for i in 5..30 {
            assert!(st[i] < bars[i].close);
        }
    }

    #[test]
    fn flips_to_resistance_in_a_crash() {
        let mut closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        closes.extend((0..15).map(|i| 118.0 - 4.0 * i as f64));
        let bars = make_bars(&closes);
        let st = Supertrend::new(5, 2.0).compute(&bars);
        let last = bars.len() - 1;
        assert!(st[last] > bars[last].close);
    }
}
