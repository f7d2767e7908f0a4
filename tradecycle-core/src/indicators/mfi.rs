//! Money Flow Index: a volume-weighted RSI over the typical price.

use crate::adapter::Indicator;
use crate::domain::Bar;

pub fn mfi_series(bars: &[Bar], period: usize) -> Vec<f64> {
    let n = bars.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n <= period {
        return result;
    }
    let tp: Vec<f64> = bars.iter().map(|b| b.hlc3()).collect();
    let mut pos = vec![0.0; n];
    let mut neg = vec![0.0; n];
    for i in 1..n {
        let flow = tp[i] * bars[i].volume as f64;
        if tp[i] > tp[i - 1] {
            pos[i] = flow;
        } else if tp[i] < tp[i - 1] {
            neg[i] = flow;
        }
    }
    for i in period..n {
        let p: f64 = pos[(i + 1 - period)..=i].iter().sum();
        let m: f64 = neg[(i + 1 - period)..=i].iter().sum();
        result[i] = if p == 0.0 && m == 0.0 {
            50.0
        } else if m == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + p / m)
        };
    }
    result
}

#[derive(Debug, Clone)]
pub struct Mfi {
    period: usize,
    name: String,
}

impl Mfi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "MFI period must be >= 1");
        Self {
            period,
            name: format!("mfi_{period}"),
        }
    }
}

impl Indicator for Mfi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        mfi_series(bars, self.period)
    }
}
