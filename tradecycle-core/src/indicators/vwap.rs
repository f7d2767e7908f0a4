//! Intraday VWAP over the typical price (hlc3), reset at each new session date,
//! and its upper deviation band.
//!
//! The band uses the running population stddev of the VWAP values themselves
//! since the session start. A zero-volume bar counts as volume 1.

use crate::adapter::Indicator;
use crate::domain::Bar;

/// `(vwap, upper_band)` with `num_stddev` deviations.
pub fn vwap_series(bars: &[Bar], num_stddev: f64) -> (Vec<f64>, Vec<f64>) {
    let n = bars.len();
    let mut vwap = Vec::with_capacity(n);
    let mut upper = Vec::with_capacity(n);

    let mut pv_sum = 0.0;
    let mut vol_sum = 0.0;
    let mut vwap_sum = 0.0;
    let mut dev_sum = 0.0;
    let mut count = 0usize;
    let mut session = None;

    for bar in bars {
        if session != Some(bar.date()) {
            session = Some(bar.date());
            pv_sum = 0.0;
            vol_sum = 0.0;
            vwap_sum = 0.0;
            dev_sum = 0.0;
            count = 0;
        }
        let volume = bar.volume.max(1) as f64;
        pv_sum += bar.hlc3() * volume;
        vol_sum += volume;
        let value = pv_sum / vol_sum;

        count += 1;
        vwap_sum += value;
        let avg = vwap_sum / count as f64;
        dev_sum += (value - avg).powi(2);
        let stdev = (dev_sum / count as f64).sqrt();

        vwap.push(value);
        upper.push(value + stdev * num_stddev);
    }
    (vwap, upper)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VwapLine {
    Vwap,
    Upper,
}

#[derive(Debug, Clone)]
pub struct Vwap {
    num_stddev: f64,
    line: VwapLine,
    name: String,
}

impl Vwap {
    pub fn new(line: VwapLine, num_stddev: f64) -> Self {
        let name = match line {
            VwapLine::Vwap => "vwap".to_string(),
            VwapLine::Upper => format!("vwap_upper_{num_stddev}"),
        };
        Self {
            num_stddev,
            line,
            name,
        }
    }
}

impl Indicator for Vwap {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let (vwap, upper) = vwap_series(bars, self.num_stddev);
        match self.line {
            VwapLine::Vwap => vwap,
            VwapLine::Upper => upper,
        }
    }
}
