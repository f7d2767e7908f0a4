//! TTM trend: a bar is in an uptrend when its close is above the average
//! hl2 of the trailing `period` bars (current included).
//!
//! Output is +1.0 (up) or -1.0 (down).

use crate::adapter::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct TtmTrend {
    period: usize,
    name: String,
}

impl TtmTrend {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "trend period must be >= 1");
        Self {
            period,
            name: format!("ttm_trend_{period}"),
        }
    }
}

impl Indicator for TtmTrend {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        for i in (self.period - 1)..n {
            let window = &bars[(i + 1 - self.period)..=i];
            let avg = window.iter().map(Bar::hl2).sum::<f64>() / self.period as f64;
            result[i] = if bars[i].close > avg { 1.0 } else { -1.0 };
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    #[test]
    fn follows_direction() {
        let up: Vec<f64> = (0..8).map(|i| 100.0 + i as f64).collect();
        let down: Vec<f64> = (0..8).map(|i| 100.0 - i as f64).collect();
        let t = TtmTrend::new(5);
        assert_eq!(t.compute(&make_bars(&up))[7], 1.0);
        assert_eq!(t.compute(&make_bars(&down))[7], -1.0);
        assert!(t.compute(&make_bars(&up))[3].is_nan());
    }
}
