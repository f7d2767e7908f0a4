//! Collaborator seams: broker, market data and market clock.
//!
//! The engine owns one boxed implementation of each. `PaperBroker`,
//! `NoMarketData` and `RegularHours` make the engine runnable without any
//! outside service.

use crate::domain::{Bar, Side};
use crate::error::BoundaryError;
use crate::signals::PatternSignal;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use std::time::{Duration, Instant};

/// Regular trading hours of one day, exchange-local.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub open: NaiveDateTime,
    pub close: NaiveDateTime,
}

/// Order routing. Every call carries an explicit timeout; the engine never retries.
pub trait Broker: Send {
    /// Called once per bar before any order, with the bar being evaluated.
    fn observe(&mut self, _bar: &Bar) {}

    /// Open `quantity` shares on `side`; returns the fill price.
    fn open_position(&mut self, side: Side, quantity: f64, timeout: Duration) -> Result<f64, BoundaryError>;

    /// Close `quantity` shares of the `side` position; returns the fill price.
    fn close_position(&mut self, side: Side, quantity: f64, timeout: Duration) -> Result<f64, BoundaryError>;
}

/// External series keyed by bar time. Missing values are NaN.
pub trait MarketData: Send {
    fn breadth(&self, ts: NaiveDateTime) -> f64;
    fn relative_strength(&self, ts: NaiveDateTime) -> f64;
    fn pattern(&self, ts: NaiveDateTime) -> Option<PatternSignal>;
}

pub trait MarketClock: Send {
    fn session(&self, date: NaiveDate) -> Option<Session>;
}

// ─── Paper broker ───────────────────────────────────────────────────

/// Fills every order immediately at the close of the observed bar.
#[derive(Debug, Clone, Default)]
pub struct PaperBroker {
    last_close: Option<f64>,
    fills: usize,
}

impl PaperBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fills(&self) -> usize {
        self.fills
    }

    fn fill(&mut self, operation: &'static str, quantity: f64, timeout: Duration) -> Result<f64, BoundaryError> {
        let started = Instant::now();
        if quantity <= 0.0 || !quantity.is_finite() {
            return Err(BoundaryError::Rejected {
                operation,
                reason: format!("invalid quantity {quantity}"),
            });
        }
        let price = self
            .last_close
            .ok_or_else(|| BoundaryError::Unavailable("paper broker has no price".into()))?;
        if started.elapsed() > timeout {
            return Err(BoundaryError::Timeout {
                operation,
                after: timeout,
            });
        }
        self.fills += 1;
        Ok(price)
    }
}

impl Broker for PaperBroker {
    fn observe(&mut self, bar: &Bar) {
        self.last_close = Some(bar.close);
    }

    fn open_position(&mut self, _side: Side, quantity: f64, timeout: Duration) -> Result<f64, BoundaryError> {
        self.fill("open_position", quantity, timeout)
    }

    fn close_position(&mut self, _side: Side, quantity: f64, timeout: Duration) -> Result<f64, BoundaryError> {
        self.fill("close_position", quantity, timeout)
    }
}

// ─── Market data ────────────────────────────────────────────────────

/// No breadth, relative strength or pattern feed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMarketData;

impl MarketData for NoMarketData {
    fn breadth(&self, _ts: NaiveDateTime) -> f64 {
        f64::NAN
    }

    fn relative_strength(&self, _ts: NaiveDateTime) -> f64 {
        f64::NAN
    }

    fn pattern(&self, _ts: NaiveDateTime) -> Option<PatternSignal> {
        None
    }
}

// ─── Clock ──────────────────────────────────────────────────────────

/// Fixed daily hours on weekdays. Holidays are not modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegularHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl Default for RegularHours {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl MarketClock for RegularHours {
    fn session(&self, date: NaiveDate) -> Option<Session> {
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return None;
        }
        Some(Session {
            open: date.and_time(self.open),
            close: date.and_time(self.close),
        })
    }
}
