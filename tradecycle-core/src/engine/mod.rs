//! Decision engine: one instrument's signal bank, mode machine and ledger
//! behind injected collaborators.
//!
//! Every bar goes through the same three steps regardless of driver:
//!
//! 1. `prepare`: record the external series values for the bar
//! 2. `frame`: compute the causal indicator frame over the history
//! 3. `step`: evaluate the machine on a copy, commit it, execute the
//!    resulting decisions through the broker

pub mod boundary;
pub mod driver;

pub use boundary::{Broker, MarketClock, MarketData, NoMarketData, PaperBroker, RegularHours, Session};
pub use driver::{BatchDriver, BatchReport, ContextBook, StreamingDriver};

use crate::adapter::IndicatorFrame;
use crate::config::EngineConfig;
use crate::context::{DailyContext, WeeklyContext};
use crate::domain::{Action, ActionKind, Bar};
use crate::error::{BoundaryError, EngineError};
use crate::indicators::plan::{ExternalInputs, IndicatorPlan};
use crate::ledger::{OpenTicket, TradeLedger};
use crate::machine::{BarContext, Decision, Machine, ModeState};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Counters for one engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineStats {
    pub bars: usize,
    /// Bars skipped for missing or short indicator data.
    pub skipped_bars: usize,
    pub actions: usize,
}

pub struct Engine {
    config: EngineConfig,
    plan: IndicatorPlan,
    machine: Machine,
    ledger: TradeLedger,
    broker: Box<dyn Broker>,
    market: Box<dyn MarketData>,
    clock: Box<dyn MarketClock>,
    breadth: Vec<f64>,
    relative_strength: Vec<f64>,
    stats: EngineStats,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("symbol", &self.config.symbol)
            .field("mode", &self.machine.mode())
            .field("legs", &self.machine.legs().len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl Engine {
    /// Validate `config` and wire the collaborators. Configuration errors are fatal here.
    pub fn new(
        config: EngineConfig,
        broker: Box<dyn Broker>,
        market: Box<dyn MarketData>,
        clock: Box<dyn MarketClock>,
    ) -> Result<Self, EngineError> {
        let set = config.validate()?;
        let plan = IndicatorPlan::new(&config, &set);
        debug!(symbol = %config.symbol, plan = ?plan, warmup = plan.warmup(), "engine ready");
        Ok(Self {
            machine: Machine::new(set, &config.session),
            ledger: TradeLedger::new(config.symbol.clone()),
            plan,
            config,
            broker,
            market,
            clock,
            breadth: Vec::new(),
            relative_strength: Vec::new(),
            stats: EngineStats::default(),
        })
    }

    /// Paper broker, no market data, regular hours.
    pub fn paper(config: EngineConfig) -> Result<Self, EngineError> {
        Self::new(
            config,
            Box::new(PaperBroker::new()),
            Box::new(NoMarketData),
            Box::new(RegularHours::default()),
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    pub fn mode(&self) -> ModeState {
        self.machine.mode()
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn ledger(&self) -> &TradeLedger {
        &self.ledger
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn warmup(&self) -> usize {
        self.plan.warmup()
    }

    /// Record the external series values for `bar`. Call once per bar, in order.
    pub fn prepare(&mut self, bar: &Bar) {
        self.breadth.push(self.market.breadth(bar.timestamp));
        self.relative_strength.push(self.market.relative_strength(bar.timestamp));
    }

    /// Indicator frame over `bars`, which must be the prepared history or a prefix of it.
    pub fn frame(&self, bars: &[Bar]) -> IndicatorFrame {
        self.plan.compute(
            bars,
            ExternalInputs {
                breadth: &self.breadth,
                relative_strength: &self.relative_strength,
            },
        )
    }

    /// Evaluate the last bar of `bars`.
    ///
    /// A bar with missing indicator data is skipped and leaves the machine
    /// untouched. Broker failures are returned.
    pub fn step(
        &mut self,
        bars: &[Bar],
        frame: &IndicatorFrame,
        daily: Option<&DailyContext>,
        weekly: Option<&WeeklyContext>,
    ) -> Result<Vec<Action>, EngineError> {
        let Some(bar) = bars.last() else {
            return Ok(Vec::new());
        };
        self.stats.bars += 1;
        self.broker.observe(bar);

        let ctx = BarContext {
            bars,
            frame,
            session: self.clock.session(bar.date()),
            daily,
            weekly,
            pattern: self.market.pattern(bar.timestamp),
        };
        let mut next = self.machine.clone();
        let decisions = match next.evaluate(&ctx, &self.config) {
            Ok(decisions) => decisions,
            Err(err) => {
                self.stats.skipped_bars += 1;
                debug!(symbol = %self.config.symbol, index = ctx.index(), error = %err, "bar skipped");
                return Ok(Vec::new());
            }
        };
        self.machine = next;
        self.execute(decisions, bar)
    }

    /// Close every open leg at `bar`, bypassing entry gating.
    pub fn flatten(&mut self, bar: &Bar) -> Result<Vec<Action>, EngineError> {
        self.broker.observe(bar);
        let decisions = self.machine.flatten();
        self.execute(decisions, bar)
    }

    fn execute(&mut self, decisions: Vec<Decision>, bar: &Bar) -> Result<Vec<Action>, EngineError> {
        let timeout = self.config.boundary_timeout();
        let symbol = self.config.symbol.clone();
        let mut actions = Vec::with_capacity(decisions.len());

        for decision in decisions {
            match decision {
                Decision::Open {
                    side,
                    hedge,
                    quick_exit,
                    squeeze_entry,
                    info,
                } => {
                    let quantity = (self.config.sizing.position_usd / bar.close).floor();
                    if quantity.is_nan() || quantity < 1.0 {
                        debug!(symbol = %symbol, price = bar.close, "position size below one share");
                        continue;
                    }
                    let price = match self.broker.open_position(side, quantity, timeout) {
                        Ok(price) => price,
                        Err(e) => {
                            warn!(symbol = %symbol, %side, error = %e, "open failed");
                            return Err(self.interrupted(actions, e));
                        }
                    };
                    self.machine.apply_open(
                        side,
                        hedge,
                        quick_exit,
                        squeeze_entry,
                        info.natr,
                        price,
                        bar.timestamp,
                        quantity,
                        &self.config,
                    );
                    self.ledger.open(OpenTicket {
                        side,
                        hedge,
                        entry_time: bar.timestamp,
                        entry_price: price,
                        quantity,
                        natr: info.natr,
                        adx: info.adx,
                        indicator_snapshot: info.snapshot,
                    });
                    info!(symbol = %symbol, %side, price, quantity, hedge, "opened");
                    actions.push(Action {
                        kind: ActionKind::open(side),
                        timestamp: bar.timestamp,
                        price,
                        quantity,
                        reason: None,
                    });
                }
                Decision::Close { side, hedge, reason } => {
                    let Some(quantity) = self
                        .machine
                        .legs()
                        .iter()
                        .find(|l| l.position.side == side && l.hedge == hedge)
                        .map(|l| l.position.quantity)
                    else {
                        continue;
                    };
                    let price = match self.broker.close_position(side, quantity, timeout) {
                        Ok(price) => price,
                        Err(e) => {
                            warn!(symbol = %symbol, %side, error = %e, "close failed");
                            return Err(self.interrupted(actions, e));
                        }
                    };
                    self.machine.apply_close(side, hedge, &self.config);
                    let pnl = self
                        .ledger
                        .close(side, hedge, bar.timestamp, price, reason)
                        .map_or(0.0, |t| t.net_pnl());
                    info!(symbol = %symbol, %side, price, %reason, pnl, hedge, "closed");
                    actions.push(Action {
                        kind: ActionKind::close(side),
                        timestamp: bar.timestamp,
                        price,
                        quantity,
                        reason: Some(reason),
                    });
                }
            }
        }
        self.stats.actions += actions.len();
        Ok(actions)
    }

    /// Broker failure partway through a bar. Fills already made are kept.
    fn interrupted(&mut self, completed: Vec<Action>, source: BoundaryError) -> EngineError {
        self.stats.actions += completed.len();
        if completed.is_empty() {
            EngineError::Boundary(source)
        } else {
            EngineError::Partial { completed, source }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExitReason, Side};
    use std::time::Duration;

    struct FailingBroker;

    impl Broker for FailingBroker {
        fn open_position(&mut self, _side: Side, _quantity: f64, timeout: Duration) -> Result<f64, BoundaryError> {
            Err(BoundaryError::Timeout {
                operation: "open_position",
                after: timeout,
            })
        }

        fn close_position(&mut self, _side: Side, _quantity: f64, timeout: Duration) -> Result<f64, BoundaryError> {
            Err(BoundaryError::Timeout {
                operation: "close_position",
                after: timeout,
            })
        }
    }

    /// Fills at 100 until call number `fail_on` (1-based), which times out.
    struct FailsOnCall {
        calls: usize,
        fail_on: usize,
    }

    impl FailsOnCall {
        fn call(&mut self, operation: &'static str, timeout: Duration) -> Result<f64, BoundaryError> {
            self.calls += 1;
            if self.calls == self.fail_on {
                return Err(BoundaryError::Timeout {
                    operation,
                    after: timeout,
                });
            }
            Ok(100.0)
        }
    }

    impl Broker for FailsOnCall {
        fn open_position(&mut self, _side: Side, _quantity: f64, timeout: Duration) -> Result<f64, BoundaryError> {
            self.call("open_position", timeout)
        }

        fn close_position(&mut self, _side: Side, _quantity: f64, timeout: Duration) -> Result<f64, BoundaryError> {
            self.call("close_position", timeout)
        }
    }

    #[test]
    fn unknown_indicator_is_fatal_at_construction() {
        let cfg = EngineConfig {
            primary: "stochfoo".into(),
            ..Default::default()
        };
        let err = Engine::paper(cfg).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn warmup_bars_are_skipped_and_counted() {
        let mut engine = Engine::paper(EngineConfig::default()).unwrap();
        let bars = crate::indicators::make_bars(&[100.0; 5]);
        for b in &bars {
            engine.prepare(b);
        }
        let frame = engine.frame(&bars);
        for i in 0..bars.len() {
            assert!(engine.step(&bars[..=i], &frame, None, None).unwrap().is_empty());
        }
        let stats = engine.stats();
        assert_eq!(stats.bars, 5);
        assert_eq!(stats.skipped_bars, 5);
        assert_eq!(engine.mode(), ModeState::EnterLong);
    }

    #[test]
    fn flatten_with_failing_broker_reports_timeout() {
        let cfg = EngineConfig::default();
        let mut engine = Engine::new(
            cfg.clone(),
            Box::new(FailingBroker),
            Box::new(NoMarketData),
            Box::new(RegularHours::default()),
        )
        .unwrap();
        let bars = crate::indicators::make_bars(&[100.0]);
        engine.machine.apply_open(Side::Long, false, false, false, 0.2, 100.0, bars[0].timestamp, 10.0, &cfg);
        let err = engine.flatten(&bars[0]).unwrap_err();
        assert!(matches!(err, EngineError::Boundary(BoundaryError::Timeout { .. })));
        assert!(!err.is_fatal());
        assert_eq!(engine.machine().legs().len(), 1);
    }

    #[test]
    fn second_fill_failure_keeps_the_first_action() {
        let cfg = EngineConfig::default();
        let mut engine = Engine::new(
            cfg.clone(),
            Box::new(FailsOnCall { calls: 0, fail_on: 2 }),
            Box::new(NoMarketData),
            Box::new(RegularHours::default()),
        )
        .unwrap();
        let bars = crate::indicators::make_bars(&[100.0]);
        let t = bars[0].timestamp;
        for (side, hedge) in [(Side::Long, false), (Side::Short, true)] {
            engine.machine.apply_open(side, hedge, false, false, 0.2, 100.0, t, 10.0, &cfg);
            engine.ledger.open(OpenTicket {
                side,
                hedge,
                entry_time: t,
                entry_price: 100.0,
                quantity: 10.0,
                natr: 0.2,
                adx: 20.0,
                indicator_snapshot: Default::default(),
            });
        }

        let err = engine.flatten(&bars[0]).unwrap_err();
        assert!(matches!(
            &err,
            EngineError::Partial {
                source: BoundaryError::Timeout { .. },
                ..
            }
        ));
        assert!(!err.is_fatal());
        let completed = err.completed();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].kind, ActionKind::CloseLong);
        assert_eq!(completed[0].reason, Some(ExitReason::Flatten));
        assert_eq!(engine.ledger().trades().len(), 1);
        assert_eq!(engine.machine().legs().len(), 1);
        assert_eq!(engine.stats().actions, 1);
    }
}
