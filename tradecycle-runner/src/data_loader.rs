//! CSV data loading for the runner.
//!
//! Bars come from `timestamp,open,high,low,close,volume` files. External
//! series (breadth, relative strength) come from `timestamp,value` files and
//! are served to the engine through [`CsvMarketData`].
//!
//! Bars with a NaN price, a non-positive price, or a high/low range that does
//! not bracket the body are dropped with a warning. Ordering is left to the
//! drivers, which reject regressions and duplicates.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use tradecycle_core::domain::Bar;
use tradecycle_core::engine::MarketData;
use tradecycle_core::signals::PatternSignal;

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path} line {line}: {source}")]
    Row {
        path: PathBuf,
        line: u64,
        #[source]
        source: csv::Error,
    },

    #[error("{path} line {line}: unparseable timestamp `{value}`")]
    Timestamp { path: PathBuf, line: u64, value: String },

    #[error("{path} holds no usable bars")]
    Empty { path: PathBuf },
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

#[derive(Debug, Deserialize)]
struct BarRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct SeriesRow {
    timestamp: String,
    value: f64,
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, LoadError> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })
}

fn line_of(record: &csv::StringRecord) -> u64 {
    record.position().map_or(0, |p| p.line())
}

/// Load OHLCV bars in file order.
pub fn load_bars(path: &Path) -> Result<Vec<Bar>, LoadError> {
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?
        .clone();

    let mut bars = Vec::new();
    let mut dropped = 0usize;
    for record in reader.records() {
        let record = record.map_err(|source| LoadError::Row {
            path: path.to_path_buf(),
            line: 0,
            source,
        })?;
        let line = line_of(&record);
        let row: BarRow = record.deserialize(Some(&headers)).map_err(|source| LoadError::Row {
            path: path.to_path_buf(),
            line,
            source,
        })?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| LoadError::Timestamp {
            path: path.to_path_buf(),
            line,
            value: row.timestamp.clone(),
        })?;
        let bar = Bar {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume.max(0.0).round() as u64,
        };
        if !bar.is_sane() {
            warn!(path = %path.display(), line, %timestamp, "dropping unusable bar");
            dropped += 1;
            continue;
        }
        bars.push(bar);
    }

    if bars.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }
    debug!(path = %path.display(), bars = bars.len(), dropped, "bars loaded");
    Ok(bars)
}

/// Load a `timestamp,value` series. Non-finite values are kept as NaN.
pub fn load_series(path: &Path) -> Result<BTreeMap<NaiveDateTime, f64>, LoadError> {
    let mut reader = open_reader(path)?;
    let mut series = BTreeMap::new();
    for row in reader.deserialize::<SeriesRow>() {
        let row = row.map_err(|source| LoadError::Row {
            path: path.to_path_buf(),
            line: source.position().map_or(0, |p| p.line()),
            source,
        })?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| LoadError::Timestamp {
            path: path.to_path_buf(),
            line: 0,
            value: row.timestamp.clone(),
        })?;
        series.insert(timestamp, row.value);
    }
    Ok(series)
}

/// Write bars in the format [`load_bars`] reads.
pub fn write_bars_csv(path: &Path, bars: &[Bar]) -> Result<(), csv::Error> {
    #[derive(Serialize)]
    struct Row<'a> {
        timestamp: &'a str,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    }

    let mut writer = csv::Writer::from_path(path)?;
    for bar in bars {
        let ts = bar.timestamp.format(TIMESTAMP_FORMATS[0]).to_string();
        writer.serialize(Row {
            timestamp: &ts,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        })?;
    }
    writer.flush()?;
    Ok(())
}

// ─── Market data ─────────────────────────────────────────────────────

/// Breadth and relative-strength series read from CSV.
///
/// Lookups are as-of: the last value at or before the bar time, NaN before
/// the first sample. Candlestick patterns are not sourced from files.
#[derive(Debug, Clone, Default)]
pub struct CsvMarketData {
    breadth: BTreeMap<NaiveDateTime, f64>,
    relative_strength: BTreeMap<NaiveDateTime, f64>,
}

impl CsvMarketData {
    pub fn new(
        breadth: BTreeMap<NaiveDateTime, f64>,
        relative_strength: BTreeMap<NaiveDateTime, f64>,
    ) -> Self {
        Self {
            breadth,
            relative_strength,
        }
    }

    pub fn load(breadth: Option<&Path>, relative_strength: Option<&Path>) -> Result<Self, LoadError> {
        Ok(Self {
            breadth: breadth.map(load_series).transpose()?.unwrap_or_default(),
            relative_strength: relative_strength.map(load_series).transpose()?.unwrap_or_default(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.breadth.is_empty() && self.relative_strength.is_empty()
    }
}

fn as_of(series: &BTreeMap<NaiveDateTime, f64>, ts: NaiveDateTime) -> f64 {
    series.range(..=ts).next_back().map_or(f64::NAN, |(_, v)| *v)
}

impl MarketData for CsvMarketData {
    fn breadth(&self, ts: NaiveDateTime) -> f64 {
        as_of(&self.breadth, ts)
    }

    fn relative_strength(&self, ts: NaiveDateTime) -> f64 {
        as_of(&self.relative_strength, ts)
    }

    fn pattern(&self, _ts: NaiveDateTime) -> Option<PatternSignal> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn timestamp_formats() {
        assert_eq!(ts("2024-01-02 09:30:00"), ts("2024-01-02T09:30:00"));
        assert_eq!(ts("2024-01-02 09:30"), ts("2024-01-02T09:30"));
        assert!(parse_timestamp("01/02/2024 09:30").is_none());
    }

    #[test]
    fn loads_bars_and_drops_unusable_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "bars.csv",
            "timestamp,open,high,low,close,volume\n\
             2024-01-02 09:30:00,100,101,99,100.5,1200\n\
             2024-01-02 09:31:00,0,0,0,0,0\n\
             2024-01-02 09:32:00,100,99,101,100,10\n\
             2024-01-02 09:33:00,100.5,100.9,100.1,100.2,900.4\n",
        );
        let bars = load_bars(&path).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 100.5);
        assert_eq!(bars[1].volume, 900);
        assert_eq!(bars[1].timestamp, ts("2024-01-02 09:33"));
    }

    #[test]
    fn bad_timestamp_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "bars.csv",
            "timestamp,open,high,low,close,volume\nyesterday,1,1,1,1,1\n",
        );
        assert!(matches!(load_bars(&path), Err(LoadError::Timestamp { .. })));
    }

    #[test]
    fn empty_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "bars.csv", "timestamp,open,high,low,close,volume\n");
        assert!(matches!(load_bars(&path), Err(LoadError::Empty { .. })));
    }

    #[test]
    fn bars_survive_a_write_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let bars = crate::synthetic::minute_bars("RT", 1, 3);
        let path = dir.path().join("rt.csv");
        write_bars_csv(&path, &bars).unwrap();
        let loaded = load_bars(&path).unwrap();
        assert_eq!(loaded.len(), bars.len());
        assert_eq!(loaded[5].timestamp, bars[5].timestamp);
        assert_eq!(loaded[5].close, bars[5].close);
    }

    #[test]
    fn market_data_is_as_of() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "breadth.csv",
            "timestamp,value\n2024-01-02 09:31:00,2.5\n2024-01-02 09:35:00,-1.0\n",
        );
        let data = CsvMarketData::load(Some(&path), None).unwrap();
        assert!(data.breadth(ts("2024-01-02 09:30")).is_nan());
        assert_eq!(data.breadth(ts("2024-01-02 09:31")), 2.5);
        assert_eq!(data.breadth(ts("2024-01-02 09:34")), 2.5);
        assert_eq!(data.breadth(ts("2024-01-02 09:40")), -1.0);
        assert!(data.relative_strength(ts("2024-01-02 09:40")).is_nan());
        assert!(data.pattern(ts("2024-01-02 09:40")).is_none());
    }
}
