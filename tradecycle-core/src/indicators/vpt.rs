//! Volume Price Trend and its SMA signal line.
//!
//! VPT[0] = 0, VPT[t] = VPT[t-1] + volume * (close - prev_close) / prev_close.

use crate::adapter::Indicator;
use crate::domain::Bar;
use crate::indicators::ma::sma_of_series;

pub fn vpt_series(bars: &[Bar]) -> Vec<f64> {
    let mut out = Vec::with_capacity(bars.len());
    let mut sum = 0.0;
    for (i, bar) in bars.iter().enumerate() {
        if i > 0 {
            let mut prev = bars[i - 1].close;
            if prev == 0.0 {
                prev = bar.close;
            }
            if prev != 0.0 {
                sum += bar.volume as f64 * (bar.close - prev) / prev;
            }
        }
        out.push(sum);
    }
    out
}

#[derive(Debug, Clone)]
pub struct Vpt {
    /// `None` for the raw VPT, `Some(period)` for its SMA.
    sma_period: Option<usize>,
    name: String,
}

impl Vpt {
    pub fn raw() -> Self {
        Self {
            sma_period: None,
            name: "vpt".into(),
        }
    }

    pub fn sma(period: usize) -> Self {
        assert!(period >= 1, "VPT SMA period must be >= 1");
        Self {
            sma_period: Some(period),
            name: format!("vpt_sma_{period}"),
        }
    }
}

impl Indicator for Vpt {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.sma_period.map_or(0, |p| p - 1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let vpt = vpt_series(bars);
        match self.sma_period {
            None => vpt,
            Some(p) => sma_of_series(&vpt, p),
        }
    }
}
