//! Bollinger Bands: SMA +/- multiplier * population stddev of a price source.
//!
//! Two bands as separate Indicator instances. Lookback: period - 1.

use crate::adapter::Indicator;
use crate::domain::{Bar, PriceSource};

/// Which side of the envelope to compute. Shared with `keltner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Upper,
    Lower,
}

impl Band {
    pub(crate) fn sign(self) -> f64 {
        match self {
            Band::Upper => 1.0,
            Band::Lower => -1.0,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Band::Upper => "upper",
            Band::Lower => "lower",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    source: PriceSource,
    band: Band,
    name: String,
}

impl Bollinger {
    pub fn new(period: usize, multiplier: f64, source: PriceSource, band: Band) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        Self {
            period,
            multiplier,
            source,
            band,
            name: format!("bbands_{}_{period}_{multiplier}", band.label()),
        }
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        if n < self.period {
            return result;
        }
        let prices: Vec<f64> = bars.iter().map(|b| b.price(self.source)).collect();
        let p = self.period as f64;
        for i in (self.period - 1)..n {
            let window = &prices[(i + 1 - self.period)..=i];
            if window.iter().any(|v| v.is_nan()) {
                continue;
            }
            let mean = window.iter().sum::<f64>() / p;
            let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / p;
            result[i] = mean + self.band.sign() * self.multiplier * variance.sqrt();
        }
        result
    }
}
