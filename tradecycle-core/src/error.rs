//! Error taxonomy of the decision core.
//!
//! - `ConfigError`: fatal, raised once when the engine is constructed.
//! - `DataError`: one bar is unusable; the bar is skipped and processing continues.
//! - `BoundaryError`: a broker or data collaborator failed; the driver decides what to do.
//!   When it fails partway through a bar the actions already filled travel with it.
//! - `InvariantViolation`: bar ordering broken; fatal for the run.

use crate::domain::Action;
use chrono::NaiveDateTime;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Unknown indicator: {0}")]
    UnknownIndicator(String),

    #[error("conflicting options: `{0}` and `{1}` cannot both be enabled")]
    Conflict(&'static str, &'static str),

    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("`{0}` requires `{1}`")]
    Requires(&'static str, &'static str),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// A single bar cannot be evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("series `{0}` was not computed")]
    MissingSeries(String),

    #[error("series `{name}` has no value at bar {index}")]
    ShortSeries { name: String, index: usize },

    #[error("not enough history: need {needed} bars before bar {index}")]
    ShortHistory { needed: usize, index: usize },

    #[error("missing context: {0}")]
    MissingContext(&'static str),
}

/// Failure at the broker / market-data boundary. Never retried by the core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoundaryError {
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("{operation} rejected: {reason}")]
    Rejected {
        operation: &'static str,
        reason: String,
    },

    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    #[error("bar at {next} is not after previous bar at {previous}")]
    OutOfOrder {
        previous: NaiveDateTime,
        next: NaiveDateTime,
    },

    #[error("duplicate bar timestamp {0}")]
    Duplicate(NaiveDateTime),
}

/// Top-level error returned by engine and driver operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("boundary error: {0}")]
    Boundary(#[from] BoundaryError),

    /// The broker failed after earlier decisions of the same bar were filled.
    #[error("boundary error after {} filled action(s): {source}", .completed.len())]
    Partial { completed: Vec<Action>, source: BoundaryError },

    #[error("invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("instrument {symbol} is frozen after: {cause}")]
    Frozen { symbol: String, cause: String },
}

impl EngineError {
    /// Whether the run can continue with the next bar.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, EngineError::Boundary(_) | EngineError::Partial { .. })
    }

    /// Actions that were executed before the failure.
    pub fn completed(&self) -> &[Action] {
        match self {
            EngineError::Partial { completed, .. } => completed,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_messages() {
        let e = ConfigError::UnknownIndicator("stochfoo".into());
        assert_eq!(e.to_string(), "Unknown indicator: stochfoo");
        let e = ConfigError::Conflict("no_crossover", "crossover_only");
        assert!(e.to_string().contains("no_crossover"));
    }

    #[test]
    fn engine_error_from_conversions() {
        let e: EngineError = BoundaryError::Unavailable("broker".into()).into();
        assert!(!e.is_fatal());
        let t = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let e: EngineError = InvariantViolation::Duplicate(t).into();
        assert!(e.is_fatal());
    }
}
