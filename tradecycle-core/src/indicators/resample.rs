//! Bar aggregation: fixed-size groups for the higher-timeframe StochRSI and
//! calendar days for key-level discovery.

use crate::adapter::Indicator;
use crate::domain::Bar;
use crate::indicators::stochastic::Stochastic;

fn merge(group: &[Bar]) -> Option<Bar> {
    let first = group.first()?;
    let last = group.last()?;
    Some(Bar {
        timestamp: first.timestamp,
        open: first.open,
        high: group.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max),
        low: group.iter().map(|b| b.low).fold(f64::INFINITY, f64::min),
        close: last.close,
        volume: group.iter().map(|b| b.volume).sum(),
    })
}

/// Complete groups of `factor` consecutive bars, anchored at index 0.
/// A trailing partial group is dropped.
pub fn aggregate(bars: &[Bar], factor: usize) -> Vec<Bar> {
    if factor == 0 {
        return Vec::new();
    }
    bars.chunks_exact(factor).filter_map(merge).collect()
}

/// One bar per calendar date.
pub fn daily(bars: &[Bar]) -> Vec<Bar> {
    let mut out = Vec::new();
    let mut start = 0;
    for i in 1..=bars.len() {
        if i == bars.len() || bars[i].date() != bars[start].date() {
            out.extend(merge(&bars[start..i]));
            start = i;
        }
    }
    out
}

/// A stochastic computed on `factor`-bar aggregates, mapped back to the base
/// timeframe. Bar `i` sees the last group that had completed by bar `i`.
#[derive(Debug, Clone)]
pub struct HigherTimeframe {
    factor: usize,
    inner: Stochastic,
    name: String,
}

impl HigherTimeframe {
    pub fn new(factor: usize, inner: Stochastic) -> Self {
        assert!(factor >= 1, "timeframe factor must be >= 1");
        let name = format!("htf{factor}_{}", inner.name());
        Self {
            factor,
            inner,
            name,
        }
    }
}

impl Indicator for HigherTimeframe {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        (self.inner.lookback() + 1) * self.factor - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let groups = aggregate(bars, self.factor);
        let values = self.inner.compute(&groups);
        (0..bars.len())
            .map(|i| {
                let completed = (i + 1) / self.factor;
                if completed == 0 {
                    f64::NAN
                } else {
                    values.get(completed - 1).copied().unwrap_or(f64::NAN)
                }
            })
            .collect()
    }
}
