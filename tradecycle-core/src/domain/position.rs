use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

/// Signed percent move from `from` to `to`, in the direction favourable to `side`.
///
/// Positive means the move helps the position, negative means it hurts.
pub fn favourable_pct(side: Side, from: f64, to: f64) -> f64 {
    if from == 0.0 || from.is_nan() || to.is_nan() {
        return 0.0;
    }
    side.sign() * (to / from - 1.0) * 100.0
}

/// An open position. Created on entry, dropped on exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: Side,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub quantity: f64,
    /// Trailing reference for the stop, moved on favourable resets.
    pub base_price: f64,
    /// Cost basis; never moves.
    pub orig_base_price: f64,
}

impl Position {
    pub fn open(side: Side, fill_price: f64, time: NaiveDateTime, quantity: f64) -> Self {
        Self {
            side,
            entry_price: fill_price,
            entry_time: time,
            quantity,
            base_price: fill_price,
            orig_base_price: fill_price,
        }
    }

    /// Percent gain from entry (negative when losing).
    pub fn gain_pct(&self, price: f64) -> f64 {
        favourable_pct(self.side, self.entry_price, price)
    }

    /// Percent move from the trailing base.
    pub fn move_from_base_pct(&self, price: f64) -> f64 {
        favourable_pct(self.side, self.base_price, price)
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.side.sign() * (price - self.entry_price) * self.quantity
    }
}
