//! Choppiness Index.
//!
//! CHOP = 100 * log10(sum(TR, n) / (max(high, n) - min(low, n))) / log10(n)
//! High values (above ~61.8) mark a choppy market, low values (below ~38.2) a trend.

use crate::adapter::Indicator;
use crate::domain::Bar;
use crate::indicators::atr::true_range;

pub fn chop_series(bars: &[Bar], period: usize) -> Vec<f64> {
    let n = bars.len();
    let mut result = vec![f64::NAN; n];
    if period < 2 || n <= period {
        return result;
    }
    let tr = true_range(bars);
    let log_n = (period as f64).log10();
    // TR[0] has no previous close, so the first window starts at 1.
    for i in period..n {
        let window = &bars[(i + 1 - period)..=i];
        let tr_sum: f64 = tr[(i + 1 - period)..=i].iter().sum();
        let hi = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let lo = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let range = hi - lo;
        if range <= 0.0 || tr_sum.is_nan() {
            continue;
        }
        result[i] = 100.0 * (tr_sum / range).log10() / log_n;
    }
    result
}

#[derive(Debug, Clone)]
pub struct Chop {
    period: usize,
    name: String,
}

impl Chop {
    pub fn new(period: usize) -> Self {
        assert!(period >= 2, "Choppiness period must be >= 2");
        Self {
            period,
            name: format!("chop_{period}"),
        }
    }
}

impl Indicator for Chop {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        chop_series(bars, self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    #[test]
    fn trend_is_less_choppy_than_chop() {
        let trend: Vec<f64> = (0..30).map(|i| 100.0 + 2.0 * i as f64).collect();
        let zigzag: Vec<f64> = (0..30)
            .map(|i| if i % 2 == 0 { 100.0 } else { 103.0 })
            .collect();
        let t = chop_series(&make_bars(&trend), 14);
        let z = chop_series(&make_bars(&zigzag), 14);
        assert!(t[13].is_nan());
        assert!(t[29] < z[29], "trend {} vs zigzag {}", t[29], z[29]);
        assert!(z[29] > 61.8);
    }
}
