//! HOLD_LONG / HOLD_SHORT: the exit rules of every open leg, in priority
//! order. The first rule that fires closes the leg.

use super::{straddle, BarContext, Decision, Leg, Machine};
use crate::adapter::SeriesKey;
use crate::config::{EngineConfig, PrimaryIndicator, ReversalCheck};
use crate::domain::{Bar, ExitReason, Side};
use crate::error::DataError;
use crate::signals::{BarView, SqueezeState};
use crate::thresholds::BaseEvent;
use tracing::debug;

enum LegOutcome {
    Hold,
    Exit(ExitReason),
    /// The squeeze breakout behind the entry has lingered too long.
    Lingered,
}

/// Whether the current bar turned against `side`.
fn reversal(check: ReversalCheck, side: Side, bar: &Bar, view: &BarView<'_>) -> Result<bool, DataError> {
    let heikin_ashi = || -> Result<bool, DataError> {
        let open = view.frame.value(SeriesKey::HaOpen, view.index)?;
        let close = view.frame.value(SeriesKey::HaClose, view.index)?;
        Ok(side.sign() * (close - open) < 0.0)
    };
    let trend = || -> Result<bool, DataError> { Ok(side.sign() * view.frame.value(SeriesKey::TtmTrend, view.index)? < 0.0) };
    Ok(match check {
        ReversalCheck::Candle => match side {
            Side::Long => bar.is_red(),
            Side::Short => bar.is_green(),
        },
        ReversalCheck::HeikinAshi => heikin_ashi()?,
        ReversalCheck::Trend => trend()?,
        ReversalCheck::Combined => heikin_ashi()? && trend()?,
    })
}

/// Price reached half way to VWAP (when VWAP is in profit) or half way into
/// the upper band (when VWAP is under the entry). Mirrored for shorts.
fn vwap_target_hit(side: Side, entry: f64, price: f64, vwap: f64, upper: f64) -> bool {
    let band = upper - vwap;
    match side {
        Side::Long if vwap > entry => price >= entry + (vwap - entry) / 2.0,
        Side::Long if vwap < entry => price >= vwap + band / 2.0,
        Side::Short if vwap < entry => price <= entry - (entry - vwap) / 2.0,
        Side::Short if vwap > entry => price <= vwap - band / 2.0,
        _ => false,
    }
}

fn leg_outcome(
    leg: &mut Leg,
    primary: PrimaryIndicator,
    ctx: &BarContext<'_>,
    config: &EngineConfig,
    squeeze: &SqueezeState,
) -> Result<LegOutcome, DataError> {
    let bar = ctx.bar()?;
    let view = ctx.view()?;
    let index = ctx.index();
    let side = leg.position.side;
    let price = bar.close;
    let gain = leg.position.gain_pct(price);
    let exits = &config.exits;
    let session = &config.session;

    if !session.allow_overnight {
        if let Some(minutes) = ctx.minutes_to_close() {
            if minutes <= session.forced_exit_minutes {
                return Ok(LegOutcome::Exit(ExitReason::EndOfDay));
            }
            if minutes <= session.last_hour_minutes && gain >= session.last_hour_threshold {
                return Ok(LegOutcome::Exit(ExitReason::LastHour));
            }
        }
    }

    if leg.thresholds.on_price(&mut leg.position, price, exits.stoploss) == BaseEvent::StopOut {
        return Ok(LegOutcome::Exit(ExitReason::StopLoss));
    }

    let turned = reversal(exits.reversal, side, bar, &view)?;
    if let Some(reason) = leg.thresholds.profit_exit(gain, turned) {
        return Ok(LegOutcome::Exit(reason));
    }
    if leg.thresholds.cost_basis_exit(gain, exits.cost_basis_exit) {
        return Ok(LegOutcome::Exit(ExitReason::CostBasis));
    }

    if exits.vwap_exit {
        let vwap = ctx.frame.value(SeriesKey::Vwap, index)?;
        let upper = ctx.frame.value(SeriesKey::VwapUpper, index)?;
        if vwap_target_hit(side, leg.position.entry_price, price, vwap, upper) {
            return Ok(LegOutcome::Exit(ExitReason::VwapExit));
        }
    }

    if exits.stochastic_exit
        && !exits.strict_exit_percent
        && !leg.thresholds.exit_armed
        && leg.exit_signals.stochastic_exit(primary, side, &view, config)?
    {
        return Ok(LegOutcome::Exit(ExitReason::StochasticReversal));
    }

    if exits.mesa_sine_exit && leg.exit_signals.mesa_sine_exit(side, &view, config)? {
        return Ok(LegOutcome::Exit(ExitReason::MesaSineExit));
    }
    if exits.roc_exit {
        let roc = ctx.frame.value(SeriesKey::Roc, index)?;
        if side.sign() * roc < -config.indicators.roc_threshold {
            return Ok(LegOutcome::Exit(ExitReason::RocExit));
        }
    }

    if leg.squeeze_entry && squeeze.lingered(config.squeeze.xover_exit_count) {
        return Ok(LegOutcome::Lingered);
    }
    Ok(LegOutcome::Hold)
}

/// One bar in a hold mode.
///
/// Legs are evaluated independently: a leg whose data is missing keeps its
/// state and is skipped, the others still act. The bar fails only when no
/// leg could be evaluated.
pub(crate) fn evaluate_hold(machine: &mut Machine, ctx: &BarContext<'_>, config: &EngineConfig) -> Result<Vec<Decision>, DataError> {
    let squeeze = *machine.bank().squeeze();
    let primary = machine.bank().set().primary;
    let straddled = machine.is_straddled();
    let price = ctx.bar()?.close;

    let mut decisions = Vec::new();
    let mut failed = None;
    let mut evaluated = 0;
    for leg in machine.legs_mut() {
        let (side, hedge) = (leg.position.side, leg.hedge);
        let close = move |reason| Decision::Close { side, hedge, reason };
        let mut next = leg.clone();
        let outcome = match leg_outcome(&mut next, primary, ctx, config, &squeeze) {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!(symbol = %config.symbol, %side, hedge, error = %err, "leg skipped");
                failed.get_or_insert(err);
                continue;
            }
        };
        *leg = next;
        evaluated += 1;
        match outcome {
            LegOutcome::Hold => {}
            LegOutcome::Exit(reason) => decisions.push(close(reason)),
            LegOutcome::Lingered if straddled => {}
            // The hedge replaces the linger exit only while the leg is under water.
            LegOutcome::Lingered if straddle::should_hedge(leg, straddled, price, config) => {
                decisions.push(straddle::hedge(leg, ctx, config));
            }
            LegOutcome::Lingered if config.squeeze.linger_exit => decisions.push(close(ExitReason::SqueezeLinger)),
            LegOutcome::Lingered => {}
        }
    }
    match failed {
        Some(err) if evaluated == 0 => Err(err),
        _ => Ok(decisions),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{bars_at, flat_frame, session, set_series};
    use super::*;
    use crate::adapter::IndicatorFrame;
    use crate::config::ExitConfig;
    use crate::signals::SignalState;

    fn ctx<'a>(bars: &'a [Bar], frame: &'a IndicatorFrame) -> BarContext<'a> {
        BarContext {
            bars,
            frame,
            session: Some(session()),
            daily: None,
            weekly: None,
            pattern: None,
        }
    }

    fn holding(cfg: &EngineConfig, side: Side, at: &Bar) -> Machine {
        let mut m = Machine::new(cfg.validate().unwrap(), &cfg.session);
        m.apply_open(side, false, cfg.exits.quick_exit, false, f64::NAN, at.close, at.timestamp, 10.0, cfg);
        m
    }

    fn base_frame(len: usize) -> IndicatorFrame {
        flat_frame(len, &[(SeriesKey::StochRsiK, 50.0), (SeriesKey::StochRsiD, 50.0)])
    }

    /// Evaluate every bar after the first; returns the first non-empty decision list.
    fn first_decisions(m: &mut Machine, bars: &[Bar], frame: &IndicatorFrame, cfg: &EngineConfig) -> Option<(usize, Vec<Decision>)> {
        (2..=bars.len()).find_map(|n| {
            let d = m.evaluate(&ctx(&bars[..n], frame), cfg).unwrap();
            (!d.is_empty()).then_some((n - 1, d))
        })
    }

    fn reason(d: &[Decision]) -> ExitReason {
        match d.first() {
            Some(Decision::Close { reason, .. }) => *reason,
            other => panic!("expected a close, got {other:?}"),
        }
    }

    #[test]
    fn stop_fires_on_tightened_decr_after_reset() {
        let cfg = EngineConfig::default();
        let bars = bars_at((10, 0), &[100.0, 100.6, 102.0, 101.5, 101.2, 100.97, 100.5]);
        let mut m = holding(&cfg, Side::Long, &bars[0]);
        let frame = base_frame(bars.len());
        let (at, d) = first_decisions(&mut m, &bars, &frame, &cfg).unwrap();
        assert_eq!(reason(&d), ExitReason::StopLoss);
        assert_eq!(at, 5);
    }

    #[test]
    fn default_stop_for_short() {
        let cfg = EngineConfig::default();
        let bars = bars_at((10, 0), &[100.0, 100.5, 101.0, 101.6]);
        let mut m = holding(&cfg, Side::Short, &bars[0]);
        let frame = base_frame(bars.len());
        let (at, d) = first_decisions(&mut m, &bars, &frame, &cfg).unwrap();
        assert_eq!(reason(&d), ExitReason::StopLoss);
        assert_eq!(at, 3);
    }

    #[test]
    fn forced_exit_near_close() {
        let cfg = EngineConfig::default();
        let bars = bars_at((15, 52), &[100.0, 100.0, 100.0, 100.0, 100.0]);
        let mut m = holding(&cfg, Side::Long, &bars[0]);
        let frame = base_frame(bars.len());
        let (at, d) = first_decisions(&mut m, &bars, &frame, &cfg).unwrap();
        assert_eq!(reason(&d), ExitReason::EndOfDay);
        // 15:55 is the first bar within five minutes of 16:00.
        assert_eq!(at, 3);
    }

    #[test]
    fn last_hour_takes_small_gain() {
        let mut cfg = EngineConfig::default();
        cfg.exits.incr_threshold = 5.0;
        let bars = bars_at((15, 10), &[100.0, 100.1, 100.3]);
        let mut m = holding(&cfg, Side::Long, &bars[0]);
        let frame = base_frame(bars.len());
        let (at, d) = first_decisions(&mut m, &bars, &frame, &cfg).unwrap();
        assert_eq!(reason(&d), ExitReason::LastHour);
        assert_eq!(at, 2);
    }

    #[test]
    fn exit_percent_waits_for_red_candle() {
        let cfg = EngineConfig {
            exits: ExitConfig {
                exit_percent: Some(1.0),
                incr_threshold: 5.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let bars = bars_at((10, 0), &[100.0, 101.2, 101.5, 101.4]);
        let mut m = holding(&cfg, Side::Long, &bars[0]);
        let frame = base_frame(bars.len());
        let (at, d) = first_decisions(&mut m, &bars, &frame, &cfg).unwrap();
        assert_eq!(reason(&d), ExitReason::ExitPercent);
        assert_eq!(at, 3);
    }

    #[test]
    fn stochastic_reversal_exit() {
        let cfg = EngineConfig::default();
        let bars = bars_at((10, 0), &[100.0, 100.2, 100.3, 100.4]);
        let mut m = holding(&cfg, Side::Long, &bars[0]);
        let mut frame = base_frame(bars.len());
        set_series(&mut frame, SeriesKey::StochRsiK, vec![70.0, 85.0, 90.0, 86.0]);
        set_series(&mut frame, SeriesKey::StochRsiD, vec![70.0, 82.0, 86.0, 88.0]);
        let (at, d) = first_decisions(&mut m, &bars, &frame, &cfg).unwrap();
        assert_eq!(reason(&d), ExitReason::StochasticReversal);
        assert_eq!(at, 3);
    }

    #[test]
    fn strict_exit_percent_disables_stochastic_exit() {
        let mut cfg = EngineConfig::default();
        cfg.exits.exit_percent = Some(5.0);
        cfg.exits.strict_exit_percent = true;
        let bars = bars_at((10, 0), &[100.0, 100.2, 100.3, 100.4]);
        let mut m = holding(&cfg, Side::Long, &bars[0]);
        let mut frame = base_frame(bars.len());
        set_series(&mut frame, SeriesKey::StochRsiK, vec![70.0, 85.0, 90.0, 86.0]);
        set_series(&mut frame, SeriesKey::StochRsiD, vec![70.0, 82.0, 86.0, 88.0]);
        assert!(first_decisions(&mut m, &bars, &frame, &cfg).is_none());
    }

    #[test]
    fn vwap_target() {
        assert!(vwap_target_hit(Side::Long, 100.0, 101.0, 102.0, 103.0));
        assert!(!vwap_target_hit(Side::Long, 100.0, 100.9, 102.0, 103.0));
        assert!(vwap_target_hit(Side::Long, 100.0, 99.6, 99.0, 100.0));
        assert!(vwap_target_hit(Side::Short, 100.0, 99.0, 98.0, 99.0));
        assert!(!vwap_target_hit(Side::Short, 100.0, 100.0, 100.0, 101.0));
    }

    #[test]
    fn roc_exit_on_momentum_flip() {
        let mut cfg = EngineConfig::default();
        cfg.exits.roc_exit = true;
        let bars = bars_at((10, 0), &[100.0, 100.1, 100.2]);
        let mut m = holding(&cfg, Side::Long, &bars[0]);
        let mut frame = base_frame(bars.len());
        set_series(&mut frame, SeriesKey::Roc, vec![0.1, 0.0, -0.2]);
        let (at, d) = first_decisions(&mut m, &bars, &frame, &cfg).unwrap();
        assert_eq!(reason(&d), ExitReason::RocExit);
        assert_eq!(at, 2);
    }

    fn squeeze_holding(cfg: &EngineConfig, at: &Bar) -> Machine {
        let mut m = Machine::new(cfg.validate().unwrap(), &cfg.session);
        m.apply_open(Side::Long, false, false, true, f64::NAN, at.close, at.timestamp, 10.0, cfg);
        m.bank_mut().squeeze_mut().signal = SignalState {
            crossover: true,
            linger_count: cfg.squeeze.xover_exit_count,
            ..Default::default()
        };
        m
    }

    #[test]
    fn lingered_breakout_hedges_under_water_and_exits_in_profit() {
        let mut cfg = EngineConfig::default();
        cfg.secondaries = vec!["squeeze".into()];
        cfg.squeeze.straddle = true;
        cfg.squeeze.linger_exit = true;

        let bars = bars_at((10, 0), &[100.0, 100.2]);
        let frame = base_frame(bars.len());
        let mut m = squeeze_holding(&cfg, &bars[0]);
        let d = evaluate_hold(&mut m, &ctx(&bars, &frame), &cfg).unwrap();
        assert_eq!(reason(&d), ExitReason::SqueezeLinger);

        let bars = bars_at((10, 0), &[100.0, 99.8]);
        let mut m = squeeze_holding(&cfg, &bars[0]);
        let d = evaluate_hold(&mut m, &ctx(&bars, &frame), &cfg).unwrap();
        assert!(matches!(d.as_slice(), [Decision::Open { side: Side::Short, hedge: true, .. }]));

        // Without the linger exit a profitable lingering leg just holds.
        cfg.squeeze.linger_exit = false;
        let bars = bars_at((10, 0), &[100.0, 100.2]);
        let mut m = squeeze_holding(&cfg, &bars[0]);
        assert!(evaluate_hold(&mut m, &ctx(&bars, &frame), &cfg).unwrap().is_empty());
    }

    #[test]
    fn one_leg_missing_data_does_not_drop_the_other_legs_stop() {
        let cfg = EngineConfig::default();
        let bars = bars_at((10, 0), &[100.0, 98.4]);
        let frame = IndicatorFrame::new(bars.len());
        let mut m = holding(&cfg, Side::Long, &bars[0]);
        m.apply_open(Side::Short, true, false, false, f64::NAN, 100.0, bars[0].timestamp, 10.0, &cfg);

        // The short hedge needs StochRSI for its reversal exit; the frame has none.
        let d = evaluate_hold(&mut m, &ctx(&bars, &frame), &cfg).unwrap();
        assert_eq!(d, vec![Decision::Close { side: Side::Long, hedge: false, reason: ExitReason::StopLoss }]);
        let hedge = m.legs().iter().find(|l| l.hedge).unwrap();
        assert_eq!(hedge.position.base_price, 100.0);

        // A lone leg with missing data fails the bar.
        let mut m = holding(&cfg, Side::Short, &bars[0]);
        assert!(evaluate_hold(&mut m, &ctx(&bars, &frame), &cfg).is_err());
    }

    #[test]
    fn heikin_ashi_reversal() {
        let bars = bars_at((10, 0), &[100.0, 101.0]);
        let mut frame = base_frame(2);
        set_series(&mut frame, SeriesKey::HaOpen, vec![100.0, 101.0]);
        set_series(&mut frame, SeriesKey::HaClose, vec![100.5, 100.8]);
        let view = ctx(&bars, &frame).view().unwrap();
        assert!(reversal(ReversalCheck::HeikinAshi, Side::Long, &bars[1], &view).unwrap());
        assert!(!reversal(ReversalCheck::Candle, Side::Long, &bars[1], &view).unwrap());
        assert!(reversal(ReversalCheck::Trend, Side::Long, &bars[1], &view).is_err());
    }
}
