//! Prior-session and multi-day reference data consumed by the resistance filter.
//!
//! The engine never computes these from its own bar history; the caller
//! supplies them per bar (the runner derives them from the previous session
//! and from daily aggregates).

use crate::domain::Bar;
use crate::indicators::profile::value_area;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A support/resistance price discovered on longer-timeframe data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyLevel {
    pub price: f64,
    pub timestamp: NaiveDateTime,
    /// How many fractal levels clustered within 1.5% of this one.
    pub touches: u32,
}

/// Classic floor-trader pivots from the prior session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotLevels {
    pub pivot: f64,
    pub r1: f64,
    pub s1: f64,
    pub r2: f64,
    pub s2: f64,
}

impl PivotLevels {
    pub fn classic(high: f64, low: f64, close: f64) -> Self {
        let pivot = (high + low + close) / 3.0;
        Self {
            pivot,
            r1: 2.0 * pivot - low,
            s1: 2.0 * pivot - high,
            r2: pivot + (high - low),
            s2: pivot - (high - low),
        }
    }

    /// `(label, price)` pairs in a fixed order.
    pub fn levels(&self) -> [(&'static str, f64); 5] {
        [
            ("pivot", self.pivot),
            ("r1", self.r1),
            ("s1", self.s1),
            ("r2", self.r2),
            ("s2", self.s2),
        ]
    }
}

/// Volume-profile value area of the prior session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueArea {
    pub low: f64,
    pub high: f64,
    /// Point of control: the most-traded price bin.
    pub poc: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyContext {
    /// Session the context applies to (not the session it was derived from).
    pub date: NaiveDate,
    pub prev_close: f64,
    pub prev_high: f64,
    pub prev_low: f64,
    #[serde(default)]
    pub pivots: Option<PivotLevels>,
    #[serde(default)]
    pub value_area: Option<ValueArea>,
}

impl DailyContext {
    /// Derive the context for `date` from the bars of the previous session.
    /// Returns None when `prior_session` is empty.
    pub fn from_prior_session(date: NaiveDate, prior_session: &[Bar], tick_size: f64) -> Option<Self> {
        let last = prior_session.last()?;
        let prev_high = prior_session
            .iter()
            .map(|b| b.high)
            .fold(f64::NEG_INFINITY, f64::max);
        let prev_low = prior_session
            .iter()
            .map(|b| b.low)
            .fold(f64::INFINITY, f64::min);
        Some(Self {
            date,
            prev_close: last.close,
            prev_high,
            prev_low,
            pivots: Some(PivotLevels::classic(prev_high, prev_low, last.close)),
            value_area: value_area(prior_session, tick_size),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyContext {
    pub key_levels: Vec<KeyLevel>,
}

impl WeeklyContext {
    pub fn new(key_levels: Vec<KeyLevel>) -> Self {
        Self { key_levels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_ohlc_bars, DEFAULT_EPSILON};

    #[test]
    fn classic_pivots() {
        let p = PivotLevels::classic(110.0, 90.0, 100.0);
        assert_approx(p.pivot, 100.0, DEFAULT_EPSILON);
        assert_approx(p.r1, 110.0, DEFAULT_EPSILON);
        assert_approx(p.s1, 90.0, DEFAULT_EPSILON);
        assert_approx(p.r2, 120.0, DEFAULT_EPSILON);
        assert_approx(p.s2, 80.0, DEFAULT_EPSILON);
    }

    #[test]
    fn prior_session_summary() {
        let bars = make_ohlc_bars(&[
            (100.0, 102.0, 99.0, 101.0),
            (101.0, 105.0, 100.0, 104.0),
            (104.0, 104.5, 97.0, 98.0),
        ]);
        let date = bars[0].date().succ_opt().unwrap();
        let ctx = DailyContext::from_prior_session(date, &bars, 0.01).unwrap();
        assert_eq!(ctx.date, date);
        assert_approx(ctx.prev_close, 98.0, DEFAULT_EPSILON);
        assert_approx(ctx.prev_high, 105.0, DEFAULT_EPSILON);
        assert_approx(ctx.prev_low, 97.0, DEFAULT_EPSILON);
        assert!(ctx.pivots.is_some());
        assert!(ctx.value_area.is_some());
        assert!(DailyContext::from_prior_session(date, &[], 0.01).is_none());
    }
}
