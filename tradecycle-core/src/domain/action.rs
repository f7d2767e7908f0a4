use super::position::Side;
use super::trade::ExitReason;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four discrete trading actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    OpenLong,
    CloseLong,
    OpenShort,
    CloseShort,
}

impl ActionKind {
    pub fn open(side: Side) -> Self {
        match side {
            Side::Long => ActionKind::OpenLong,
            Side::Short => ActionKind::OpenShort,
        }
    }

    pub fn close(side: Side) -> Self {
        match side {
            Side::Long => ActionKind::CloseLong,
            Side::Short => ActionKind::CloseShort,
        }
    }

    pub fn side(self) -> Side {
        match self {
            ActionKind::OpenLong | ActionKind::CloseLong => Side::Long,
            ActionKind::OpenShort | ActionKind::CloseShort => Side::Short,
        }
    }

    pub fn is_open(self) -> bool {
        matches!(self, ActionKind::OpenLong | ActionKind::OpenShort)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            ActionKind::OpenLong => "open_long",
            ActionKind::CloseLong => "close_long",
            ActionKind::OpenShort => "open_short",
            ActionKind::CloseShort => "close_short",
        })
    }
}

/// An action emitted by the engine for one bar, priced at the broker fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub quantity: f64,
    pub reason: Option<ExitReason>,
}
