//! Keltner Channel: EMA of a price source +/- multiplier * ATR.
//!
//! Lookback: max(period - 1, atr_period).

use crate::adapter::Indicator;
use crate::domain::{Bar, PriceSource};
use crate::indicators::atr::atr_series;
use crate::indicators::bollinger::Band;
use crate::indicators::ma::ema_of_series;

#[derive(Debug, Clone)]
pub struct Keltner {
    period: usize,
    atr_period: usize,
    multiplier: f64,
    source: PriceSource,
    band: Band,
    name: String,
}

impl Keltner {
    pub fn new(
        period: usize,
        atr_period: usize,
        multiplier: f64,
        source: PriceSource,
        band: Band,
    ) -> Self {
        assert!(period >= 1 && atr_period >= 1, "Keltner periods must be >= 1");
        Self {
            period,
            atr_period,
            multiplier,
            source,
            band,
            name: format!("kchannel_{}_{period}_{atr_period}_{multiplier}", band.label()),
        }
    }
}

impl Indicator for Keltner {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1).max(self.atr_period)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let prices: Vec<f64> = bars.iter().map(|b| b.price(self.source)).collect();
        let mid = ema_of_series(&prices, self.period);
        let atr = atr_series(bars, self.atr_period);
        mid.iter()
            .zip(&atr)
            .map(|(m, a)| m + self.band.sign() * self.multiplier * a)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_brackets_the_midline() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i as f64 * 0.4).sin() * 3.0).collect();
        let bars = crate::indicators::make_bars(&closes);
        let upper = Keltner::new(5, 5, 1.5, PriceSource::Close, Band::Upper).compute(&bars);
        let lower = Keltner::new(5, 5, 1.5, PriceSource::Close, Band::Lower).compute(&bars);
        assert!(upper[4].is_nan());
        for i in 5..30 {
            assert!(upper[i] > lower[i]);
        }
    }
}
