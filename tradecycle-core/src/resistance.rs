//! Resistance filter: vetoes entries that sit right under resistance (longs)
//! or right above support (shorts).
//!
//! Every reference level near the current price is judged by where the
//! trailing average of the 15 preceding closes sits. An average on the
//! breaking side of the level means the level has been acting as a ceiling
//! (longs) or floor (shorts) and the entry is vetoed.

use crate::config::ResistanceConfig;
use crate::context::{DailyContext, WeeklyContext};
use crate::domain::Side;
use crate::error::DataError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Preceding closes averaged for the level test.
pub const TRAILING_BARS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VetoReason {
    PrevDayClose,
    Vwap,
    Pivot,
    ValueArea,
    HighOfDay,
    LowOfDay,
    KeyLevel,
    /// Strict key-level mode and no level nearby.
    NoKeyLevel,
}

impl fmt::Display for VetoReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VetoReason::PrevDayClose => "prev_day_close",
            VetoReason::Vwap => "vwap",
            VetoReason::Pivot => "pivot",
            VetoReason::ValueArea => "value_area",
            VetoReason::HighOfDay => "high_of_day",
            VetoReason::LowOfDay => "low_of_day",
            VetoReason::KeyLevel => "key_level",
            VetoReason::NoKeyLevel => "no_key_level",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Allowed,
    Vetoed { reason: VetoReason, level: f64 },
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed)
    }
}

/// Everything the filter looks at for one candidate entry.
#[derive(Debug, Clone, Copy)]
pub struct ResistanceInput<'a> {
    pub side: Side,
    pub index: usize,
    pub price: f64,
    /// Closes before the current bar, oldest first. At least `TRAILING_BARS`.
    pub preceding_closes: &'a [f64],
    /// Closes of the current session before the current bar.
    pub session_closes: &'a [f64],
    pub hour: u32,
    pub vwap: f64,
    pub daily: Option<&'a DailyContext>,
    pub weekly: Option<&'a WeeklyContext>,
}

fn within_pct(level: f64, price: f64, pct: f64) -> bool {
    level > 0.0 && price > 0.0 && ((level / price - 1.0) * 100.0).abs() <= pct
}

/// The trailing average sits on the breaking side of `level`.
fn acting_as_barrier(side: Side, avg: f64, level: f64) -> bool {
    match side {
        Side::Long => avg < level,
        Side::Short => avg > level,
    }
}

/// Judge one entry against every configured reference level.
pub fn check_resistance(input: &ResistanceInput<'_>, config: &ResistanceConfig) -> Result<Verdict, DataError> {
    if !config.enabled {
        return Ok(Verdict::Allowed);
    }
    let n = input.preceding_closes.len();
    if n < TRAILING_BARS {
        return Err(DataError::ShortHistory {
            needed: TRAILING_BARS,
            index: input.index,
        });
    }
    let avg = input.preceding_closes[n - TRAILING_BARS..].iter().sum::<f64>() / TRAILING_BARS as f64;
    let price = input.price;
    let side = input.side;
    let near_pct = config.price_resistance_pct;

    let mut references: Vec<(VetoReason, f64)> = Vec::new();
    if let Some(daily) = input.daily {
        if config.use_pdc {
            references.push((VetoReason::PrevDayClose, daily.prev_close));
        }
    }
    if config.use_vwap && !input.vwap.is_nan() {
        references.push((VetoReason::Vwap, input.vwap));
    }
    if let Some(daily) = input.daily {
        if config.use_pivots {
            if let Some(pivots) = daily.pivots {
                references.extend(pivots.levels().iter().map(|(_, lvl)| (VetoReason::Pivot, *lvl)));
            }
        }
        if config.use_value_area {
            if let Some(va) = daily.value_area {
                references.extend([va.low, va.poc, va.high].map(|lvl| (VetoReason::ValueArea, lvl)));
            }
        }
    }
    for (reason, level) in references {
        if within_pct(level, price, near_pct) && acting_as_barrier(side, avg, level) {
            return Ok(Verdict::Vetoed { reason, level });
        }
    }

    if config.hod_lod_check && input.hour >= config.hod_lod_after_hour && !input.session_closes.is_empty() {
        let closes = input.session_closes.iter().copied();
        let verdict = match side {
            Side::Long => {
                let hod = closes.fold(f64::NEG_INFINITY, f64::max);
                (price < hod && within_pct(hod, price, near_pct)).then_some((VetoReason::HighOfDay, hod))
            }
            Side::Short => {
                let lod = closes.fold(f64::INFINITY, f64::min);
                (price > lod && within_pct(lod, price, near_pct)).then_some((VetoReason::LowOfDay, lod))
            }
        };
        if let Some((reason, level)) = verdict {
            return Ok(Verdict::Vetoed { reason, level });
        }
    }

    if config.use_key_levels {
        let levels = input.weekly.map(|w| w.key_levels.as_slice()).unwrap_or(&[]);
        // Longs test key levels as support, shorts as resistance.
        let level_pct = match side {
            Side::Long => config.price_support_pct,
            Side::Short => config.price_resistance_pct,
        };
        let mut near_any = false;
        for lvl in levels.iter().filter(|l| l.touches >= config.min_key_level_touches) {
            if within_pct(lvl.price, price, level_pct) {
                near_any = true;
                if acting_as_barrier(side, avg, lvl.price) {
                    return Ok(Verdict::Vetoed {
                        reason: VetoReason::KeyLevel,
                        level: lvl.price,
                    });
                }
            }
        }
        if config.keylevel_strict && !near_any {
            return Ok(Verdict::Vetoed {
                reason: VetoReason::NoKeyLevel,
                level: f64::NAN,
            });
        }
    }
    Ok(Verdict::Allowed)
}
