//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use tradecycle_core::domain::Bar;
use tradecycle_core::engine::MarketData;
use tradecycle_core::signals::PatternSignal;

/// 2024-01-02 09:30, a Tuesday.
pub fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(9, 30, 0).unwrap()
}

/// One-minute bars from close prices. open = previous close, wicks of 0.05.
pub fn minute_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: start() + chrono::Duration::minutes(i as i64),
                open,
                high: open.max(close) + 0.05,
                low: open.min(close) - 0.05,
                close,
                volume: 1000,
            }
        })
        .collect()
}

/// Breadth values keyed by bar time; everything else missing.
#[derive(Debug, Clone)]
pub struct ScriptedBreadth(HashMap<NaiveDateTime, f64>);

impl ScriptedBreadth {
    pub fn new(bars: &[Bar], values: &[f64]) -> Self {
        Self(bars.iter().map(|b| b.timestamp).zip(values.iter().copied()).collect())
    }
}

impl MarketData for ScriptedBreadth {
    fn breadth(&self, ts: NaiveDateTime) -> f64 {
        self.0.get(&ts).copied().unwrap_or(f64::NAN)
    }

    fn relative_strength(&self, _ts: NaiveDateTime) -> f64 {
        f64::NAN
    }

    fn pattern(&self, _ts: NaiveDateTime) -> Option<PatternSignal> {
        None
    }
}
