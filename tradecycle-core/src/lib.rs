//! tradecycle core: the per-bar decision engine for one equity instrument.
//!
//! - Indicator adapter and built-in causal indicators
//! - Signal bank (stochastic, trend stack, squeeze, secondaries)
//! - Resistance filter and threshold controller
//! - Mode state machine with the straddle sub-state
//! - Trade ledger
//! - Engine with injected broker / market data / clock, plus batch and streaming drivers

pub mod adapter;
pub mod config;
pub mod context;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod indicators;
pub mod ledger;
pub mod machine;
pub mod resistance;
pub mod signals;
pub mod thresholds;

pub use config::EngineConfig;
pub use engine::{BatchDriver, BatchReport, ContextBook, Engine, EngineStats, StreamingDriver};
pub use error::{BoundaryError, ConfigError, DataError, EngineError, InvariantViolation};
pub use ledger::{LedgerSummary, TradeLedger};
pub use machine::ModeState;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: core types can cross threads, so the runner can
    /// evaluate instruments on a rayon pool.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Action>();
        require_sync::<domain::Action>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();
        require_send::<domain::TradeRecord>();
        require_sync::<domain::TradeRecord>();

        require_send::<adapter::IndicatorFrame>();
        require_sync::<adapter::IndicatorFrame>();
        require_send::<signals::SignalBank>();
        require_sync::<signals::SignalBank>();
        require_send::<signals::SqueezeState>();
        require_sync::<signals::SqueezeState>();
        require_send::<thresholds::LegThresholds>();
        require_sync::<thresholds::LegThresholds>();
        require_send::<machine::Machine>();
        require_sync::<machine::Machine>();
        require_send::<TradeLedger>();
        require_sync::<TradeLedger>();

        require_send::<EngineConfig>();
        require_sync::<EngineConfig>();
        require_send::<context::DailyContext>();
        require_sync::<context::DailyContext>();
        require_send::<ContextBook>();
        require_sync::<ContextBook>();
        require_send::<fingerprint::RunFingerprint>();
        require_sync::<fingerprint::RunFingerprint>();
        require_send::<EngineError>();
        require_sync::<EngineError>();

        // Collaborators are boxed `Send` trait objects; the engine moves between threads.
        require_send::<Engine>();
        require_send::<StreamingDriver>();
    }

    /// Evaluation never sees the broker: `Machine::evaluate` only takes bars,
    /// indicators and contexts, and returns decisions for the engine to execute.
    #[test]
    fn machine_evaluation_has_no_broker_parameter() {
        fn _check(
            machine: &mut machine::Machine,
            ctx: &machine::BarContext<'_>,
            config: &EngineConfig,
        ) -> Result<Vec<machine::Decision>, DataError> {
            machine.evaluate(ctx, config)
        }
    }
}
