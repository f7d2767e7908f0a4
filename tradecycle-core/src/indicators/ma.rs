//! Moving averages over an arbitrary series, and the `MovingAverage` indicator.
//!
//! All helpers skip a leading NaN run (the warmup of an upstream indicator)
//! and seed from the first `period` valid values. A NaN after the seed taints
//! every later value.

use crate::adapter::Indicator;
use crate::domain::{Bar, PriceSource};
use serde::{Deserialize, Serialize};

/// Moving-average flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaType {
    Sma,
    #[default]
    Ema,
    Wma,
    Kama,
}

impl MaType {
    pub fn apply(self, values: &[f64], period: usize) -> Vec<f64> {
        match self {
            MaType::Sma => sma_of_series(values, period),
            MaType::Ema => ema_of_series(values, period),
            MaType::Wma => wma_of_series(values, period),
            MaType::Kama => kama_of_series(values, period),
        }
    }

    fn label(self) -> &'static str {
        match self {
            MaType::Sma => "sma",
            MaType::Ema => "ema",
            MaType::Wma => "wma",
            MaType::Kama => "kama",
        }
    }
}

fn first_valid(values: &[f64]) -> Option<usize> {
    values.iter().position(|v| !v.is_nan())
}

/// Rolling mean. Any NaN inside the window gives NaN.
pub fn sma_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 {
        return result;
    }
    for i in (period.saturating_sub(1))..n {
        let window = &values[(i + 1 - period)..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = window.iter().sum::<f64>() / period as f64;
    }
    result
}

/// EMA with alpha = 2/(period+1), seeded by the SMA of the first `period` valid values.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let alpha = 2.0 / (period as f64 + 1.0);
    seeded_recursive(values, period, alpha)
}

/// Shared seed-then-recurse helper for EMA (and Wilder smoothing in `atr`).
pub(crate) fn seeded_recursive(values: &[f64], period: usize, alpha: f64) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 {
        return result;
    }
    let start = match first_valid(values) {
        Some(s) => s,
        None => return result,
    };
    let seed_end = start + period;
    if seed_end > n {
        return result;
    }
    let seed_window = &values[start..seed_end];
    if seed_window.iter().any(|v| v.is_nan()) {
        return result;
    }
    let mut prev = seed_window.iter().sum::<f64>() / period as f64;
    result[seed_end - 1] = prev;

    for i in seed_end..n {
        if values[i].is_nan() {
            return result;
        }
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }
    result
}

/// Linearly weighted moving average (newest weight = period).
pub fn wma_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 {
        return result;
    }
    let denom = (period * (period + 1)) as f64 / 2.0;
    for i in (period.saturating_sub(1))..n {
        let window = &values[(i + 1 - period)..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        let num: f64 = window
            .iter()
            .enumerate()
            .map(|(j, v)| (j + 1) as f64 * v)
            .sum();
        result[i] = num / denom;
    }
    result
}

/// Kaufman adaptive moving average (fast 2, slow 30).
pub fn kama_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    let start = match first_valid(values) {
        Some(s) => s,
        None => return result,
    };
    if period == 0 || start + period >= n {
        return result;
    }
    let fast = 2.0 / 3.0;
    let slow = 2.0 / 31.0;
    let mut prev = values[start + period - 1];
    if prev.is_nan() {
        return result;
    }
    for i in (start + period)..n {
        let window = &values[(i - period)..=i];
        if window.iter().any(|v| v.is_nan()) {
            return result;
        }
        let change = (values[i] - values[i - period]).abs();
        let volatility: f64 = window.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
        let er = if volatility == 0.0 { 0.0 } else { change / volatility };
        let sc = (er * (fast - slow) + slow).powi(2);
        prev += sc * (values[i] - prev);
        result[i] = prev;
    }
    result
}

/// A moving average of one bar price.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    ma_type: MaType,
    period: usize,
    source: PriceSource,
    name: String,
}

impl MovingAverage {
    pub fn new(ma_type: MaType, period: usize, source: PriceSource) -> Self {
        assert!(period >= 1, "moving average period must be >= 1");
        Self {
            ma_type,
            period,
            source,
            name: format!("{}_{period}", ma_type.label()),
        }
    }
}

impl Indicator for MovingAverage {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        match self.ma_type {
            MaType::Kama => self.period,
            _ => self.period.saturating_sub(1),
        }
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let prices: Vec<f64> = bars.iter().map(|b| b.price(self.source)).collect();
        self.ma_type.apply(&prices, self.period)
    }
}
