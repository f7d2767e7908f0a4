//! End-to-end scenarios: one signal, one filter decision, one full trade
//! through the engine and paper broker.

use tradecycle_core::config::EngineConfig;
use tradecycle_core::context::{KeyLevel, WeeklyContext};
use tradecycle_core::domain::{ActionKind, ExitReason, Side};
use tradecycle_core::engine::{BatchDriver, ContextBook, Engine, PaperBroker, RegularHours};
use tradecycle_core::resistance::{check_resistance, ResistanceInput, Verdict};
use tradecycle_core::signals::{evaluate_stochastic, SignalState, StochInput, StochParams};
use tradecycle_core::ModeState;

mod common;

use common::{minute_bars, start, ScriptedBreadth};

fn breadth_config() -> EngineConfig {
    let mut cfg = EngineConfig {
        symbol: "TEST".into(),
        primary: "breadth".into(),
        ..Default::default()
    };
    cfg.resistance.enabled = false;
    cfg.exits.stochastic_exit = false;
    cfg
}

// ── Signal ───────────────────────────────────────────────────────────

#[test]
fn stochastic_k_crossing_default_low_confirms() {
    let params = StochParams {
        offset: 0.0,
        ..StochParams::from_config(&EngineConfig::default().stochastic)
    };
    let prior = SignalState {
        raw: true,
        ..Default::default()
    };
    let input = StochInput {
        cur_k: 25.0,
        cur_d: 18.0,
        prev_k: 15.0,
        prev_d: 18.0,
    };
    let state = evaluate_stochastic(Side::Long, input, &params, prior);
    assert!(state.threshold);
    assert!(state.confirmed);
}

// ── Resistance ───────────────────────────────────────────────────────

#[test]
fn key_level_above_price_with_average_above_allows_long() {
    let mut cfg = EngineConfig::default().resistance;
    cfg.price_support_pct = 3.0;
    cfg.min_key_level_touches = 3;
    let weekly = WeeklyContext::new(vec![KeyLevel {
        price: 100.0,
        timestamp: start(),
        touches: 3,
    }]);
    let preceding = [101.0; 15];
    let input = ResistanceInput {
        side: Side::Long,
        index: 15,
        price: 98.0,
        preceding_closes: &preceding,
        session_closes: &preceding,
        hour: 10,
        vwap: f64::NAN,
        daily: None,
        weekly: Some(&weekly),
    };
    assert_eq!(check_resistance(&input, &cfg), Ok(Verdict::Allowed));

    // The same level with the average below it acts as a ceiling.
    let preceding = [97.0; 15];
    let input = ResistanceInput {
        preceding_closes: &preceding,
        session_closes: &preceding,
        ..input
    };
    assert!(!check_resistance(&input, &cfg).unwrap().is_allowed());
}

// ── Full trade ───────────────────────────────────────────────────────

/// Entry at 100 on bar 30; 102 resets the base with decr 1%; 100.97 is more
/// than 1% below 102 and stops out, well before the 1.5% default.
#[test]
fn trailing_base_stop_through_the_engine() {
    let mut closes = vec![100.0; 31];
    closes.extend([100.6, 102.0, 101.5, 101.2, 100.97, 100.5]);
    let bars = minute_bars(&closes);
    let mut breadth = vec![3.5; 30];
    breadth.extend(vec![3.2; bars.len() - 30]);

    let mut engine = Engine::new(
        breadth_config(),
        Box::new(PaperBroker::new()),
        Box::new(ScriptedBreadth::new(&bars, &breadth)),
        Box::new(RegularHours::default()),
    )
    .unwrap();
    let report = BatchDriver::default().run(&mut engine, &bars, &ContextBook::new()).unwrap();

    assert_eq!(report.actions.len(), 2);
    let open = &report.actions[0];
    assert_eq!(open.kind, ActionKind::OpenLong);
    assert_eq!(open.timestamp, bars[30].timestamp);
    assert_eq!(open.price, 100.0);
    assert_eq!(open.quantity, 10.0);

    let close = &report.actions[1];
    assert_eq!(close.kind, ActionKind::CloseLong);
    assert_eq!(close.timestamp, bars[35].timestamp);
    assert_eq!(close.reason, Some(ExitReason::StopLoss));

    let trades = engine.ledger().trades();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].exit_reason, ExitReason::StopLoss);
    assert!((trades[0].net_pnl() - 9.7).abs() < 1e-9);
    assert!(engine.machine().legs().is_empty());
    assert!(!engine.mode().is_holding());
}

#[test]
fn flatten_at_end_closes_the_open_leg() {
    let mut closes = vec![100.0; 31];
    closes.extend([100.2, 100.4]);
    let bars = minute_bars(&closes);
    let mut breadth = vec![3.5; 30];
    breadth.extend(vec![3.2; bars.len() - 30]);

    let mut engine = Engine::new(
        breadth_config(),
        Box::new(PaperBroker::new()),
        Box::new(ScriptedBreadth::new(&bars, &breadth)),
        Box::new(RegularHours::default()),
    )
    .unwrap();
    let report = BatchDriver::new(true).run(&mut engine, &bars, &ContextBook::new()).unwrap();

    let last = report.actions.last().unwrap();
    assert_eq!(last.kind, ActionKind::CloseLong);
    assert_eq!(last.reason, Some(ExitReason::Flatten));
    assert_eq!(last.price, 100.4);
    assert_eq!(engine.ledger().trades().len(), 1);
    assert_eq!(engine.mode(), ModeState::EnterShort);
}

#[test]
fn short_only_never_opens_long() {
    let mut cfg = breadth_config();
    cfg.session.short_only = true;
    let closes = vec![100.0; 40];
    let bars = minute_bars(&closes);
    // Breadth sits in the long zone the whole time.
    let breadth = vec![3.5; 40];

    let mut engine = Engine::new(
        cfg,
        Box::new(PaperBroker::new()),
        Box::new(ScriptedBreadth::new(&bars, &breadth)),
        Box::new(RegularHours::default()),
    )
    .unwrap();
    let report = BatchDriver::default().run(&mut engine, &bars, &ContextBook::new()).unwrap();
    assert!(report.actions.iter().all(|a| a.kind.side() == Side::Short));
    assert_eq!(engine.mode(), ModeState::EnterShort);
}
