//! Domain types for tradecycle

pub mod action;
pub mod bar;
pub mod position;
pub mod trade;

pub use action::{Action, ActionKind};
pub use bar::{heikin_ashi, Bar, PriceSource};
pub use position::{favourable_pct, Position, Side};
pub use trade::{ExitReason, TradeRecord};
