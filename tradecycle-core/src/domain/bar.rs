//! Bar: one OHLCV sample, plus the derived Heikin-Ashi sequence.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// OHLCV bar for a single instrument and interval.
///
/// `timestamp` is the exchange-local start of the interval. Bars are produced
/// in strictly increasing timestamp order and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Returns true if any OHLC field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, body inside the range, positive prices.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn time(&self) -> NaiveTime {
        self.timestamp.time()
    }

    /// Close above open.
    pub fn is_green(&self) -> bool {
        self.close > self.open
    }

    /// Close below open.
    pub fn is_red(&self) -> bool {
        self.close < self.open
    }

    pub fn hl2(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    pub fn hlc3(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    pub fn ohlc4(&self) -> f64 {
        (self.open + self.high + self.low + self.close) / 4.0
    }

    pub fn price(&self, source: PriceSource) -> f64 {
        match source {
            PriceSource::Close => self.close,
            PriceSource::Hl2 => self.hl2(),
            PriceSource::Hlc3 => self.hlc3(),
            PriceSource::Ohlc4 => self.ohlc4(),
        }
    }
}

/// Which price of a bar an indicator reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    #[default]
    Close,
    Hl2,
    Hlc3,
    Ohlc4,
}

/// Derive Heikin-Ashi candles from a bar sequence.
///
/// Causal: HA bar `i` depends only on bars `0..=i`, so a prefix of the output
/// equals the output of the same prefix.
pub fn heikin_ashi(bars: &[Bar]) -> Vec<Bar> {
    let mut out: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        let ha_close = bar.ohlc4();
        let ha_open = match out.last() {
            Some(prev) => (prev.open + prev.close) / 2.0,
            None => (bar.open + bar.close) / 2.0,
        };
        out.push(Bar {
            timestamp: bar.timestamp,
            open: ha_open,
            high: bar.high.max(ha_open).max(ha_close),
            low: bar.low.min(ha_open).min(ha_close),
            close: ha_close,
            volume: bar.volume,
        });
    }
    out
}
