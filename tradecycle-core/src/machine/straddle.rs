//! Straddle: an under-water squeeze entry whose breakout has lingered gets an
//! opposing hedge leg instead of the linger exit.
//!
//! The contract is the same for long and short primaries. Each leg keeps its
//! own thresholds and closes on its own; the machine leaves the hold state
//! only after both are gone.

use super::{can_trade, entry_info, BarContext, Decision, Leg};
use crate::config::EngineConfig;

/// Whether `leg` should be hedged on this bar.
pub(crate) fn should_hedge(leg: &Leg, straddled: bool, price: f64, config: &EngineConfig) -> bool {
    config.squeeze.straddle
        && !straddled
        && !leg.hedge
        && leg.squeeze_entry
        && leg.position.gain_pct(price) < 0.0
        && can_trade(&config.session, leg.position.side.opposite())
}

/// Open decision for the hedge of `leg`.
pub(crate) fn hedge(leg: &Leg, ctx: &BarContext<'_>, config: &EngineConfig) -> Decision {
    Decision::Open {
        side: leg.position.side.opposite(),
        hedge: true,
        quick_exit: config.exits.quick_exit,
        squeeze_entry: false,
        info: entry_info(ctx.frame, ctx.index()),
    }
}
