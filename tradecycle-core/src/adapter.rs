//! Indicator adapter: the trait every indicator implements, offset-tracked
//! series, and the per-run frame the signal bank reads from.
//!
//! Indicators are pure functions: bar history in, numeric series out. The
//! output of an indicator may start later than the bar sequence; the start
//! offset is kept explicitly and never assumed to be zero.

use crate::domain::Bar;
use crate::error::DataError;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Trait for indicators.
///
/// `compute` returns a `Vec<f64>` the same length as `bars` with NaN warmup.
///
/// # Look-ahead guard
/// No value at bar t may depend on bar t+1 or later. Computing over a prefix
/// must give the same values as computing over the full sequence and slicing.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "rsi_14", "natr_14").
    fn name(&self) -> &str;

    /// Number of bars needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;

    /// Compute and trim the warmup into an explicit offset.
    fn series(&self, bars: &[Bar]) -> IndicatorSeries {
        IndicatorSeries::from_aligned(self.compute(bars))
    }
}

/// Values aligned to a contiguous suffix of the bar sequence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndicatorSeries {
    offset: usize,
    values: Vec<f64>,
}

impl IndicatorSeries {
    /// `values[0]` belongs to bar `offset`.
    pub fn new(offset: usize, values: Vec<f64>) -> Self {
        Self { offset, values }
    }

    /// Build from a bar-length vector, moving the leading NaN run into the offset.
    pub fn from_aligned(values: Vec<f64>) -> Self {
        let offset = values
            .iter()
            .position(|v| !v.is_nan())
            .unwrap_or(values.len());
        Self {
            offset,
            values: values[offset..].to_vec(),
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Index one past the last bar covered.
    pub fn end(&self) -> usize {
        self.offset + self.values.len()
    }

    /// Value at bar `index`, or None before the offset, past the end, or on NaN.
    pub fn get(&self, index: usize) -> Option<f64> {
        if index < self.offset {
            return None;
        }
        self.values
            .get(index - self.offset)
            .copied()
            .filter(|v| !v.is_nan())
    }
}

/// Typed key for every series the engine can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SeriesKey {
    StochRsiK,
    StochRsiD,
    StochMfiK,
    StochMfiD,
    HtfStochK,
    HtfStochD,
    Rsi,
    Mfi,
    Adx,
    PlusDi,
    MinusDi,
    AroonOsc,
    AroonOscAlt,
    Macd,
    MacdSignal,
    Atr,
    Natr,
    Vwap,
    VwapUpper,
    Vpt,
    VptSma,
    Chop,
    Supertrend,
    BbUpper,
    BbLower,
    KcUpper,
    KcLower,
    Roc,
    Mama,
    Fama,
    Sine,
    Lead,
    TtmTrend,
    HaOpen,
    HaClose,
    /// Entry stacked moving average, by position in the configured period list.
    StackedMa(usize),
    /// Long-period stack used by the trend quick exit.
    QuickExitMa(usize),
    Breadth,
    RelativeStrength,
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesKey::StackedMa(i) => write!(f, "stacked_ma_{i}"),
            SeriesKey::QuickExitMa(i) => write!(f, "quick_exit_ma_{i}"),
            other => {
                let debug = format!("{other:?}");
                let mut out = String::with_capacity(debug.len() + 4);
                for (i, ch) in debug.chars().enumerate() {
                    if ch.is_ascii_uppercase() {
                        if i > 0 {
                            out.push('_');
                        }
                        out.push(ch.to_ascii_lowercase());
                    } else {
                        out.push(ch);
                    }
                }
                f.write_str(&out)
            }
        }
    }
}

/// Every series computed for one bar sequence.
#[derive(Debug, Clone, Default)]
pub struct IndicatorFrame {
    bar_count: usize,
    series: HashMap<SeriesKey, IndicatorSeries>,
}

impl IndicatorFrame {
    pub fn new(bar_count: usize) -> Self {
        Self {
            bar_count,
            series: HashMap::new(),
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bar_count
    }

    pub fn insert(&mut self, key: SeriesKey, series: IndicatorSeries) {
        self.series.insert(key, series);
    }

    pub fn series(&self, key: SeriesKey) -> Option<&IndicatorSeries> {
        self.series.get(&key)
    }

    pub fn contains(&self, key: SeriesKey) -> bool {
        self.series.contains_key(&key)
    }

    /// Value at `index`; missing data is a `DataError`.
    pub fn value(&self, key: SeriesKey, index: usize) -> Result<f64, DataError> {
        let series = self
            .series
            .get(&key)
            .ok_or_else(|| DataError::MissingSeries(key.to_string()))?;
        series.get(index).ok_or_else(|| DataError::ShortSeries {
            name: key.to_string(),
            index,
        })
    }

    /// `(current, previous)` at `index`. Crossovers always read the pair.
    pub fn pair(&self, key: SeriesKey, index: usize) -> Result<(f64, f64), DataError> {
        if index == 0 {
            return Err(DataError::ShortSeries {
                name: key.to_string(),
                index,
            });
        }
        Ok((self.value(key, index)?, self.value(key, index - 1)?))
    }

    /// Value if present, NaN otherwise. For optional inputs such as snapshots.
    pub fn value_or_nan(&self, key: SeriesKey, index: usize) -> f64 {
        self.value(key, index).unwrap_or(f64::NAN)
    }

    /// Every series value present at `index`, keyed by series name.
    pub fn snapshot(&self, index: usize) -> BTreeMap<String, f64> {
        self.series
            .iter()
            .filter_map(|(key, series)| series.get(index).map(|v| (key.to_string(), v)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_aligned_tracks_offset() {
        let s = IndicatorSeries::from_aligned(vec![f64::NAN, f64::NAN, 1.0, 2.0]);
        assert_eq!(s.offset(), 2);
        assert_eq!(s.end(), 4);
        assert_eq!(s.get(1), None);
        assert_eq!(s.get(2), Some(1.0));
        assert_eq!(s.get(3), Some(2.0));
        assert_eq!(s.get(4), None);
    }

    #[test]
    fn all_nan_series_is_empty_suffix() {
        let s = IndicatorSeries::from_aligned(vec![f64::NAN; 3]);
        assert_eq!(s.offset(), 3);
        assert!(s.values().is_empty());
        assert_eq!(s.get(0), None);
    }

    #[test]
    fn interior_nan_is_missing() {
        let s = IndicatorSeries::new(0, vec![1.0, f64::NAN, 3.0]);
        assert_eq!(s.get(1), None);
        assert_eq!(s.get(2), Some(3.0));
    }

    #[test]
    fn frame_value_and_pair() {
        let mut frame = IndicatorFrame::new(4);
        frame.insert(SeriesKey::Rsi, IndicatorSeries::new(1, vec![30.0, 40.0, 50.0]));
        assert_eq!(frame.value(SeriesKey::Rsi, 3), Ok(50.0));
        assert_eq!(frame.pair(SeriesKey::Rsi, 3), Ok((50.0, 40.0)));
        assert!(matches!(
            frame.pair(SeriesKey::Rsi, 1),
            Err(DataError::ShortSeries { .. })
        ));
        assert_eq!(
            frame.value(SeriesKey::Adx, 3),
            Err(DataError::MissingSeries("adx".into()))
        );
    }

    #[test]
    fn snapshot_skips_missing_values() {
        let mut frame = IndicatorFrame::new(3);
        frame.insert(SeriesKey::Rsi, IndicatorSeries::new(0, vec![30.0, 40.0, 50.0]));
        frame.insert(SeriesKey::Adx, IndicatorSeries::new(2, vec![22.0]));
        let snap = frame.snapshot(1);
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.get("rsi"), Some(&40.0));
        assert_eq!(frame.snapshot(2).get("adx"), Some(&22.0));
    }

    #[test]
    fn series_key_display_is_snake_case() {
        assert_eq!(SeriesKey::StochRsiK.to_string(), "stoch_rsi_k");
        assert_eq!(SeriesKey::Natr.to_string(), "natr");
        assert_eq!(SeriesKey::StackedMa(2).to_string(), "stacked_ma_2");
    }
}
