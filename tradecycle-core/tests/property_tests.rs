//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Batch and streaming replays produce identical actions and ledgers
//! 2. Never long and short at once outside the straddle sub-state
//! 3. Re-evaluating a consumed bar leaves the machine and squeeze state unchanged
//! 4. Variable-exit thresholds never exceed the configured defaults
//! 5. A stop-out fires on the bar whose adverse move reaches decr

mod common;

use common::{minute_bars, start};
use proptest::prelude::*;
use tradecycle_core::config::{EngineConfig, ExitConfig};
use tradecycle_core::domain::{Bar, Position, Side};
use tradecycle_core::engine::{BatchDriver, ContextBook, Engine, MarketClock, RegularHours, StreamingDriver};
use tradecycle_core::machine::BarContext;
use tradecycle_core::signals::{evaluate_squeeze, BandPair, SignalState, SqueezeParams, SqueezeState};
use tradecycle_core::thresholds::{BaseEvent, LegThresholds, ThresholdSet};

// ── Strategies (proptest) ────────────────────────────────────────────

/// A random walk of 1-minute closes around 100.
fn arb_closes(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.6..0.6_f64, len).prop_map(|steps| {
        let mut price = 100.0;
        steps
            .into_iter()
            .map(|s| {
                price = (price * (1.0 + s / 100.0) * 100.0).round() / 100.0;
                price
            })
            .collect()
    })
}

fn arb_side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Long), Just(Side::Short)]
}

fn arb_band() -> impl Strategy<Value = BandPair> {
    (95.0..100.0_f64, 100.0..105.0_f64).prop_map(|(lower, upper)| BandPair { upper, lower })
}

fn arb_exits() -> impl Strategy<Value = ExitConfig> {
    (0.1..5.0_f64, 0.1..5.0_f64, prop::option::of(0.1..10.0_f64)).prop_map(|(incr, decr, exit)| ExitConfig {
        incr_threshold: incr,
        decr_threshold: decr,
        exit_percent: exit,
        variable_exit: true,
        ..Default::default()
    })
}

fn fast_config() -> EngineConfig {
    let mut cfg = EngineConfig {
        symbol: "PROP".into(),
        ..Default::default()
    };
    cfg.stochastic.rsi_period = 10;
    cfg.stochastic.k_period = 10;
    cfg.stochastic.offset = 0.0;
    cfg.resistance.enabled = false;
    cfg
}

fn replay_stream(bars: &[Bar]) -> (Vec<tradecycle_core::domain::Action>, StreamingDriver) {
    let mut driver = StreamingDriver::new(Engine::paper(fast_config()).unwrap());
    let mut actions = Vec::new();
    for bar in bars {
        actions.extend(driver.on_bar(*bar, None, None).unwrap());
    }
    (actions, driver)
}

// ── 1. Batch / stream equivalence ────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn batch_matches_stream(closes in arb_closes(40..160)) {
        let bars = minute_bars(&closes);
        let mut engine = Engine::paper(fast_config()).unwrap();
        let report = BatchDriver::default().run(&mut engine, &bars, &ContextBook::new()).unwrap();
        let (actions, driver) = replay_stream(&bars);

        prop_assert_eq!(&report.actions, &actions);
        prop_assert_eq!(engine.mode(), driver.engine().mode());
        prop_assert_eq!(
            serde_json::to_string(engine.ledger()).unwrap(),
            serde_json::to_string(driver.engine().ledger()).unwrap()
        );
    }
}

// ── 2. No dual exposure ──────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn at_most_one_leg_without_straddle(closes in arb_closes(40..160)) {
        let bars = minute_bars(&closes);
        let mut driver = StreamingDriver::new(Engine::paper(fast_config()).unwrap());
        for bar in &bars {
            driver.on_bar(*bar, None, None).unwrap();
            let legs = driver.engine().machine().legs();
            prop_assert!(legs.len() <= 1);
            if let Some(leg) = legs.first() {
                prop_assert!(driver.engine().mode().is_holding());
                prop_assert_eq!(leg.position.side, driver.engine().mode().side());
            }
        }
    }
}

// ── 3. Idempotent re-evaluation ──────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn machine_reevaluation_is_a_no_op(closes in arb_closes(40..160)) {
        let bars = minute_bars(&closes);
        let mut cfg = fast_config();
        cfg.secondaries = vec!["rsi".into(), "squeeze".into()];
        let mut engine = Engine::paper(cfg.clone()).unwrap();
        for bar in &bars {
            engine.prepare(bar);
        }
        let frame = engine.frame(&bars);
        let clock = RegularHours::default();
        let mut machine = engine.machine().clone();

        for n in 1..=bars.len() {
            let ctx = BarContext {
                bars: &bars[..n],
                frame: &frame,
                session: clock.session(bars[n - 1].date()),
                daily: None,
                weekly: None,
                pattern: None,
            };
            let mut once = machine.clone();
            if once.evaluate(&ctx, &cfg).is_err() {
                continue;
            }
            let mut twice = once.clone();
            prop_assert_eq!(twice.evaluate(&ctx, &cfg), Ok(Vec::new()));
            prop_assert_eq!(&twice, &once);
            prop_assert_eq!(twice.bank(), once.bank());
            machine = once;
        }
    }
}

proptest! {
    #[test]
    fn squeeze_reevaluation_is_a_no_op(
        bands in prop::collection::vec((arb_band(), arb_band()), 2..30),
        side in arb_side(),
    ) {
        let params = SqueezeParams::from_config(&EngineConfig::default().squeeze);
        let roc = [0.5, 0.4, 0.3];
        let mut state = SqueezeState::new();
        for i in 1..bands.len() {
            let (band, channel) = bands[i];
            let (prev_band, prev_channel) = bands[i - 1];
            state = evaluate_squeeze(band, prev_band, channel, prev_channel, state, &roc, &params, side, i);
            let again = evaluate_squeeze(band, prev_band, channel, prev_channel, state, &roc, &params, side, i);
            prop_assert_eq!(again, state);
        }
        let counters: SignalState = state.signal;
        prop_assert!(counters.squeeze_count as usize <= bands.len());
    }
}

// ── 4. Variable exit never loosens ───────────────────────────────────

proptest! {
    #[test]
    fn variable_exit_is_at_most_default(exits in arb_exits(), natr in 0.01..6.0_f64) {
        let default = ThresholdSet::from_config(&exits);
        let tightened = ThresholdSet::for_entry(&exits, natr);
        prop_assert!(tightened.decr_threshold <= default.decr_threshold);
        prop_assert!(tightened.incr_threshold <= default.incr_threshold);
        if let (Some(t), Some(d)) = (tightened.exit_percent, default.exit_percent) {
            prop_assert!(t <= d);
        }
        prop_assert!(tightened.decr_threshold >= 0.0);
    }
}

// ── 5. Stop-out on the reaching bar ──────────────────────────────────

proptest! {
    #[test]
    fn stop_fires_on_the_bar_reaching_decr(
        side in arb_side(),
        entry in 20.0..500.0_f64,
        decr in 0.2..3.0_f64,
        short_of in 0.05..0.95_f64,
    ) {
        let exits = ExitConfig {
            incr_threshold: 10.0,
            decr_threshold: decr,
            ..Default::default()
        };
        let mut position = Position::open(side, entry, start(), 10.0);
        let mut thresholds = LegThresholds::open(&exits, f64::NAN, false);

        // An adverse move short of decr holds.
        let near = entry * (1.0 - side.sign() * decr * short_of / 100.0);
        prop_assert_eq!(thresholds.on_price(&mut position, near, true), BaseEvent::Unchanged);

        // A move past decr stops on that bar.
        let through = entry * (1.0 - side.sign() * decr * 1.01 / 100.0);
        prop_assert_eq!(thresholds.on_price(&mut position, through, true), BaseEvent::StopOut);

        // With the stop disabled the same price is ignored.
        let mut position = Position::open(side, entry, start(), 10.0);
        let mut thresholds = LegThresholds::open(&exits, f64::NAN, false);
        prop_assert_eq!(thresholds.on_price(&mut position, through, false), BaseEvent::Unchanged);
    }
}
