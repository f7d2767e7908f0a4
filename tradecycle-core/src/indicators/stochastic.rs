//! Stochastic oscillator applied to an RSI or MFI series (StochRSI / StochMFI).
//!
//! raw_k = 100 * (x - min(x, k)) / (max(x, k) - min(x, k))
//! K = SMA(raw_k, slow), D = SMA(K, d). A flat window gives raw_k = 0.

use crate::adapter::Indicator;
use crate::domain::{Bar, PriceSource};
use crate::indicators::ma::sma_of_series;
use crate::indicators::mfi::mfi_series;
use crate::indicators::rsi::rsi_of_series;

/// `(K, D)` of a stochastic over `values`.
pub fn stoch_of_series(
    values: &[f64],
    k_period: usize,
    slow_period: usize,
    d_period: usize,
) -> (Vec<f64>, Vec<f64>) {
    let n = values.len();
    let mut raw = vec![f64::NAN; n];
    if k_period > 0 {
        for i in (k_period.saturating_sub(1))..n {
            let window = &values[(i + 1 - k_period)..=i];
            if window.iter().any(|v| v.is_nan()) {
                continue;
            }
            let lo = window.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            raw[i] = if hi > lo {
                100.0 * (values[i] - lo) / (hi - lo)
            } else {
                0.0
            };
        }
    }
    let k = sma_of_series(&raw, slow_period.max(1));
    let d = sma_of_series(&k, d_period.max(1));
    (k, d)
}

/// What the stochastic is applied to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StochBase {
    Rsi { period: usize, source: PriceSource },
    Mfi { period: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StochLine {
    K,
    D,
}

#[derive(Debug, Clone)]
pub struct Stochastic {
    base: StochBase,
    k_period: usize,
    slow_period: usize,
    d_period: usize,
    line: StochLine,
    name: String,
}

impl Stochastic {
    pub fn new(
        base: StochBase,
        k_period: usize,
        slow_period: usize,
        d_period: usize,
        line: StochLine,
    ) -> Self {
        assert!(k_period >= 1, "stochastic k period must be >= 1");
        let prefix = match base {
            StochBase::Rsi { period, .. } => format!("stochrsi_{period}"),
            StochBase::Mfi { period } => format!("stochmfi_{period}"),
        };
        let suffix = match line {
            StochLine::K => "k",
            StochLine::D => "d",
        };
        Self {
            base,
            k_period,
            slow_period,
            d_period,
            line,
            name: format!("{prefix}_{k_period}_{suffix}"),
        }
    }

    fn base_series(&self, bars: &[Bar]) -> Vec<f64> {
        match self.base {
            StochBase::Rsi { period, source } => {
                let prices: Vec<f64> = bars.iter().map(|b| b.price(source)).collect();
                rsi_of_series(&prices, period)
            }
            StochBase::Mfi { period } => mfi_series(bars, period),
        }
    }
}

impl Indicator for Stochastic {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        let base = match self.base {
            StochBase::Rsi { period, .. } | StochBase::Mfi { period } => period,
        };
        let k = base + self.k_period - 1 + self.slow_period.max(1) - 1;
        match self.line {
            StochLine::K => k,
            StochLine::D => k + self.d_period.max(1) - 1,
        }
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let (k, d) = stoch_of_series(
            &self.base_series(bars),
            self.k_period,
            self.slow_period,
            self.d_period,
        );
        match self.line {
            StochLine::K => k,
            StochLine::D => d,
        }
    }
}
