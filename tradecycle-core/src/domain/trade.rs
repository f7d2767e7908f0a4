//! TradeRecord: a completed round trip with the indicator state seen at entry.

use super::position::Side;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    ExitPercent,
    QuickExit,
    CostBasis,
    StochasticReversal,
    VwapExit,
    MesaSineExit,
    RocExit,
    SqueezeLinger,
    EndOfDay,
    LastHour,
    Flatten,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::ExitPercent => "exit_percent",
            ExitReason::QuickExit => "quick_exit",
            ExitReason::CostBasis => "cost_basis",
            ExitReason::StochasticReversal => "stochastic_reversal",
            ExitReason::VwapExit => "vwap_exit",
            ExitReason::MesaSineExit => "mesa_sine_exit",
            ExitReason::RocExit => "roc_exit",
            ExitReason::SqueezeLinger => "squeeze_linger",
            ExitReason::EndOfDay => "end_of_day",
            ExitReason::LastHour => "last_hour",
            ExitReason::Flatten => "flatten",
        };
        f.write_str(s)
    }
}

/// JSON has no NaN: serde_json writes it as null, so read null back as NaN.
fn nullable_f64<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// A complete round-trip trade record: entry → exit. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    // ── Identification ──
    pub symbol: String,
    pub side: Side,
    /// True for the opposing leg opened during a straddle.
    pub hedge: bool,

    // ── Entry ──
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    /// NaN when not computed; serialized as null.
    #[serde(deserialize_with = "nullable_f64")]
    pub natr: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub adx: f64,
    pub indicator_snapshot: BTreeMap<String, f64>,

    // ── Exit ──
    pub exit_time: NaiveDateTime,
    pub exit_price: f64,
    pub exit_reason: ExitReason,

    // ── Size ──
    pub quantity: f64,
}

impl TradeRecord {
    /// Realized P&L per share; sign inverted for shorts.
    pub fn pnl_per_share(&self) -> f64 {
        self.side.sign() * (self.exit_price - self.entry_price)
    }

    pub fn net_pnl(&self) -> f64 {
        self.pnl_per_share() * self.quantity
    }

    /// Return on the trade as a percent of entry price.
    pub fn return_pct(&self) -> f64 {
        if self.entry_price == 0.0 {
            return 0.0;
        }
        self.pnl_per_share() / self.entry_price * 100.0
    }

    pub fn is_winner(&self) -> bool {
        self.pnl_per_share() > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_trade(side: Side, entry: f64, exit: f64) -> TradeRecord {
        let day = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        TradeRecord {
            symbol: "SPY".into(),
            side,
            hedge: false,
            entry_time: day.and_hms_opt(10, 0, 0).unwrap(),
            entry_price: entry,
            natr: 0.3,
            adx: 27.0,
            indicator_snapshot: BTreeMap::from([("stoch_k".to_string(), 21.0)]),
            exit_time: day.and_hms_opt(11, 0, 0).unwrap(),
            exit_price: exit,
            exit_reason: ExitReason::ExitPercent,
            quantity: 10.0,
        }
    }

    #[test]
    fn long_pnl() {
        let t = sample_trade(Side::Long, 100.0, 102.0);
        assert!((t.pnl_per_share() - 2.0).abs() < 1e-9);
        assert!((t.net_pnl() - 20.0).abs() < 1e-9);
        assert!((t.return_pct() - 2.0).abs() < 1e-9);
        assert!(t.is_winner());
    }

    #[test]
    fn short_pnl_sign_is_inverted() {
        let t = sample_trade(Side::Short, 100.0, 102.0);
        assert!((t.pnl_per_share() + 2.0).abs() < 1e-9);
        assert!(!t.is_winner());
    }

    #[test]
    fn trade_serialization_roundtrip() {
        let trade = sample_trade(Side::Long, 100.0, 99.0);
        let json = serde_json::to_string(&trade).unwrap();
        let deser: TradeRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(trade, deser);
    }

    #[test]
    fn missing_entry_indicators_survive_json() {
        let mut trade = sample_trade(Side::Short, 100.0, 99.0);
        trade.adx = f64::NAN;
        let json = serde_json::to_string(&trade).unwrap();
        assert!(json.contains("\"adx\":null"));
        let deser: TradeRecord = serde_json::from_str(&json).unwrap();
        assert!(deser.adx.is_nan());
        assert_eq!(deser.natr, 0.3);
    }
}
