//! Threshold controller: the adaptive stop and profit-taking levels of one
//! open leg.
//!
//! All percentages are moves in the leg's favour, so one code path serves
//! longs and shorts.

use crate::config::ExitConfig;
use crate::domain::{favourable_pct, ExitReason, Position};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    pub incr_threshold: f64,
    pub decr_threshold: f64,
    pub exit_percent: Option<f64>,
    pub quick_exit_percent: Option<f64>,
}

impl ThresholdSet {
    /// The configured defaults.
    pub fn from_config(exits: &ExitConfig) -> Self {
        Self {
            incr_threshold: exits.incr_threshold,
            decr_threshold: exits.decr_threshold,
            exit_percent: exits.exit_percent,
            quick_exit_percent: exits.quick_exit_percent,
        }
        .clamped()
    }

    /// Defaults tightened to the entry bar's volatility. Never raised above
    /// the configured values.
    pub fn for_entry(exits: &ExitConfig, natr: f64) -> Self {
        let mut set = Self::from_config(exits);
        if !exits.variable_exit || natr.is_nan() || natr >= set.incr_threshold {
            return set;
        }
        set.incr_threshold = if set.incr_threshold > 3.0 * natr {
            2.0 * natr
        } else if set.incr_threshold > 2.0 * natr {
            1.5 * natr
        } else {
            natr
        };
        if set.decr_threshold > 2.0 * natr {
            set.decr_threshold = 2.0 * natr;
        }
        if let Some(exit) = set.exit_percent {
            if exit > 4.0 * natr {
                set.exit_percent = Some(2.0 * natr);
            }
        }
        set.clamped()
    }

    fn clamped(mut self) -> Self {
        self.incr_threshold = self.incr_threshold.max(0.0);
        self.decr_threshold = self.decr_threshold.max(0.0);
        self.exit_percent = self.exit_percent.map(|v| v.max(0.0));
        self.quick_exit_percent = self.quick_exit_percent.map(|v| v.max(0.0));
        self
    }
}

/// What the trailing-base rule decided for a bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BaseEvent {
    Unchanged,
    /// The base moved up to `new_base` after a favourable move of `incr`.
    Reset { new_base: f64 },
    /// The adverse move from the base reached `decr`.
    StopOut,
}

/// Live thresholds and exit arming of one open leg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegThresholds {
    pub set: ThresholdSet,
    pub resets: u32,
    pub exit_armed: bool,
    pub cost_basis_armed: bool,
    /// Exit on arming instead of waiting for a reversal bar.
    pub quick_exit: bool,
}

impl LegThresholds {
    pub fn open(exits: &ExitConfig, natr: f64, quick_exit: bool) -> Self {
        Self {
            set: ThresholdSet::for_entry(exits, natr),
            resets: 0,
            exit_armed: false,
            cost_basis_armed: false,
            quick_exit,
        }
    }

    /// Trailing-base rule. Moves `position.base_price` on a favourable reset.
    pub fn on_price(&mut self, position: &mut Position, price: f64, stoploss: bool) -> BaseEvent {
        let change = favourable_pct(position.side, position.base_price, price);
        if change < 0.0 {
            if stoploss && -change >= self.set.decr_threshold {
                return BaseEvent::StopOut;
            }
        } else if change > 0.0 && change >= self.set.incr_threshold {
            position.base_price = price;
            if self.resets == 0 {
                self.set.decr_threshold = self.set.incr_threshold;
                self.set.incr_threshold /= 2.0;
            }
            self.resets += 1;
            self.set = self.set.clamped();
            return BaseEvent::Reset { new_base: price };
        }
        BaseEvent::Unchanged
    }

    /// Exit-percent and quick-exit rules. `reversal` is whether this bar
    /// turned against the leg.
    pub fn profit_exit(&mut self, gain: f64, reversal: bool) -> Option<ExitReason> {
        if let Some(quick) = self.set.quick_exit_percent {
            if gain >= quick {
                return Some(ExitReason::QuickExit);
            }
        }
        let exit_percent = self.set.exit_percent?;
        if self.exit_armed {
            if reversal {
                return Some(ExitReason::ExitPercent);
            }
        } else if gain > 0.0 && gain >= exit_percent {
            self.exit_armed = true;
            if self.quick_exit {
                return Some(ExitReason::QuickExit);
            }
        }
        None
    }

    /// Cost-basis rule: once the gain reached `arm_at`, a return to entry exits.
    pub fn cost_basis_exit(&mut self, gain: f64, arm_at: Option<f64>) -> bool {
        let Some(arm_at) = arm_at else {
            return false;
        };
        if self.cost_basis_armed && gain <= 0.0 {
            return true;
        }
        if gain >= arm_at {
            self.cost_basis_armed = true;
        }
        false
    }
}
