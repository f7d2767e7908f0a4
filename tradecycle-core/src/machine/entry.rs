//! ENTER_LONG / ENTER_SHORT: session gates, primary and secondary fusion,
//! entry gates and the resistance filter.

use super::{can_trade, entry_info, BarContext, Decision, Machine, ModeState};
use crate::adapter::SeriesKey;
use crate::config::{EngineConfig, EntryGates};
use crate::domain::Side;
use crate::error::DataError;
use crate::resistance::{check_resistance, ResistanceInput, Verdict};
use crate::signals::{secondary::stacked_ma, EntryCheck};
use chrono::{Duration, Timelike};
use tracing::debug;

/// Price and volatility bounds for a new position.
fn passes_gates(gates: &EntryGates, price: f64, natr: f64) -> bool {
    let above = |min: Option<f64>, v: f64| min.map_or(true, |m| v >= m);
    let below = |max: Option<f64>, v: f64| max.map_or(true, |m| v <= m);
    above(gates.min_price, price) && below(gates.max_price, price) && above(gates.min_natr, natr) && below(gates.max_natr, natr)
}

/// Run the resistance filter for an entry on `side` at the current bar.
fn resistance_verdict(side: Side, ctx: &BarContext<'_>, config: &EngineConfig) -> Result<Verdict, DataError> {
    let index = ctx.index();
    let bar = ctx.bar()?;
    let preceding: Vec<f64> = ctx.bars[..index].iter().map(|b| b.close).collect();
    let date = bar.date();
    let session_start = ctx.bars[..index]
        .iter()
        .rposition(|b| b.date() != date)
        .map_or(0, |i| i + 1);
    let input = ResistanceInput {
        side,
        index,
        price: bar.close,
        preceding_closes: &preceding,
        session_closes: &preceding[session_start..],
        hour: bar.time().hour(),
        vwap: ctx.frame.value_or_nan(SeriesKey::Vwap, index),
        daily: ctx.daily,
        weekly: ctx.weekly,
    };
    check_resistance(&input, &config.resistance)
}

/// One bar in an entry mode.
pub(crate) fn evaluate_entry(machine: &mut Machine, ctx: &BarContext<'_>, config: &EngineConfig) -> Result<Vec<Decision>, DataError> {
    let side = machine.mode().side();
    let bar = ctx.bar()?;
    let index = ctx.index();
    let s = &config.session;

    if let (Some(session), false) = (ctx.session, s.allow_overnight) {
        if bar.timestamp < session.open + Duration::minutes(s.opening_delay_minutes) {
            return Ok(Vec::new());
        }
        if bar.timestamp >= session.close - Duration::minutes(s.entry_cutoff_minutes) {
            machine.bank_mut().reset();
            return Ok(Vec::new());
        }
    }

    let natr = ctx.frame.value(SeriesKey::Natr, index)?;
    let view = ctx.view()?;
    let check = machine.bank_mut().evaluate_entry(side, &view, config, natr)?;

    match check {
        EntryCheck::Jump => {
            let other = side.opposite();
            if can_trade(s, other) {
                debug!(symbol = %config.symbol, from = %side, to = %other, "opposite setup, switching sides");
                machine.set_mode(ModeState::enter(other));
            }
            return Ok(Vec::new());
        }
        EntryCheck::Waiting => return Ok(Vec::new()),
        EntryCheck::Primed { ref blocked } if !blocked.is_empty() => return Ok(Vec::new()),
        EntryCheck::Primed { .. } => {}
    }

    if !passes_gates(&config.gates, bar.close, natr) {
        debug!(symbol = %config.symbol, price = bar.close, natr, "entry gated");
        return Ok(Vec::new());
    }

    if let Verdict::Vetoed { reason, level } = resistance_verdict(side, ctx, config)? {
        debug!(symbol = %config.symbol, %side, %reason, level, "entry vetoed");
        return Ok(Vec::new());
    }

    // A counter-trend entry takes the first profit it gets.
    let against_trend = config.exits.trend_quick_exit
        && stacked_ma(side.opposite(), &view, config.stacked_ma.quick_exit_periods.len(), SeriesKey::QuickExitMa)?;

    Ok(vec![Decision::Open {
        side,
        hedge: false,
        quick_exit: config.exits.quick_exit || against_trend,
        squeeze_entry: machine.bank().squeeze_confirmed(),
        info: entry_info(ctx.frame, index),
    }])
}
