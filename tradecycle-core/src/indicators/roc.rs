//! Rate of Change in percent over a price source.
//!
//! ROC[t] = (p[t] - p[t-period]) / p[t-period] * 100. Lookback: period.

use crate::adapter::Indicator;
use crate::domain::{Bar, PriceSource};

#[derive(Debug, Clone)]
pub struct Roc {
    period: usize,
    source: PriceSource,
    name: String,
}

impl Roc {
    pub fn new(period: usize, source: PriceSource) -> Self {
        assert!(period >= 1, "ROC period must be >= 1");
        Self {
            period,
            source,
            name: format!("roc_{period}"),
        }
    }
}

impl Indicator for Roc {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        for i in self.period..n {
            let prev = bars[i - self.period].price(self.source);
            let curr = bars[i].price(self.source);
            if prev.is_nan() || curr.is_nan() || prev == 0.0 {
                continue;
            }
            result[i] = (curr - prev) / prev * 100.0;
        }
        result
    }
}
