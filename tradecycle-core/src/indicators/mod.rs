//! Concrete indicator implementations.
//!
//! Every indicator implements the `Indicator` trait from `adapter` and is
//! computed once per bar history by `plan::build_frame`. Indicators with more
//! than one output line (Bollinger, Keltner, MACD, DMI, MESA, VWAP, the
//! stochastics) are exposed as separate instances per line, keeping the
//! single-series trait unchanged.
//!
//! `profile`, `keylevels` and `resample::daily` are not per-bar indicators;
//! they build the prior-session and weekly contexts the resistance filter reads.

pub mod adx;
pub mod aroon;
pub mod atr;
pub mod bollinger;
pub mod chop;
pub mod keltner;
pub mod keylevels;
pub mod ma;
pub mod macd;
pub mod mesa;
pub mod mfi;
pub mod plan;
pub mod profile;
pub mod resample;
pub mod roc;
pub mod rsi;
pub mod stochastic;
pub mod supertrend;
pub mod trend;
pub mod vpt;
pub mod vwap;

pub use adx::{Adx, DiLine, Dmi};
pub use aroon::AroonOsc;
pub use atr::Atr;
pub use bollinger::{Band, Bollinger};
pub use chop::Chop;
pub use keltner::Keltner;
pub use keylevels::key_levels;
pub use ma::{MaType, MovingAverage};
pub use macd::{Macd, MacdLine};
pub use mesa::{Mesa, MesaLine};
pub use mfi::Mfi;
pub use plan::build_frame;
pub use profile::value_area;
pub use resample::{aggregate, daily, HigherTimeframe};
pub use roc::Roc;
pub use rsi::Rsi;
pub use stochastic::{StochBase, StochLine, Stochastic};
pub use supertrend::Supertrend;
pub use trend::TtmTrend;
pub use vpt::Vpt;
pub use vwap::{Vwap, VwapLine};

/// One-minute bars from close prices, starting 2024-01-02 09:30.
///
/// open = previous close (or close for the first bar),
/// high = max(open, close) + 1.0, low = min(open, close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: start + chrono::Duration::minutes(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000,
            }
        })
        .collect()
}

/// One-minute bars from explicit `(open, high, low, close)` tuples.
#[cfg(test)]
pub fn make_ohlc_bars(ohlc: &[(f64, f64, f64, f64)]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    ohlc.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Bar {
            timestamp: start + chrono::Duration::minutes(i as i64),
            open,
            high,
            low,
            close,
            volume: 1000,
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
