//! Trade ledger: append-only record of every open/close pair for one
//! instrument, plus the realized P&L summary.

use crate::domain::{ExitReason, Side, TradeRecord};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An entry waiting for its exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenTicket {
    pub side: Side,
    pub hedge: bool,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub quantity: f64,
    pub natr: f64,
    pub adx: f64,
    pub indicator_snapshot: BTreeMap<String, f64>,
}

/// Aggregate realized performance.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub trade_count: usize,
    pub winners: usize,
    pub losers: usize,
    pub win_rate: f64,
    /// Mean return percent of winning trades.
    pub avg_gain_pct: f64,
    /// Mean return percent of losing trades (negative).
    pub avg_loss_pct: f64,
    pub total_return_pct: f64,
    pub total_pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TradeLedger {
    symbol: String,
    open: Vec<OpenTicket>,
    trades: Vec<TradeRecord>,
}

impl TradeLedger {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            open: Vec::new(),
            trades: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn open(&mut self, ticket: OpenTicket) {
        self.open.push(ticket);
    }

    /// Close the ticket of `side`/`hedge` and append its record.
    ///
    /// Returns `None` when no such ticket is open.
    pub fn close(
        &mut self,
        side: Side,
        hedge: bool,
        exit_time: NaiveDateTime,
        exit_price: f64,
        exit_reason: ExitReason,
    ) -> Option<&TradeRecord> {
        let pos = self.open.iter().position(|t| t.side == side && t.hedge == hedge)?;
        let t = self.open.remove(pos);
        self.trades.push(TradeRecord {
            symbol: self.symbol.clone(),
            side: t.side,
            hedge: t.hedge,
            entry_time: t.entry_time,
            entry_price: t.entry_price,
            natr: t.natr,
            adx: t.adx,
            indicator_snapshot: t.indicator_snapshot,
            exit_time,
            exit_price,
            exit_reason,
            quantity: t.quantity,
        });
        self.trades.last()
    }

    pub fn open_tickets(&self) -> &[OpenTicket] {
        &self.open
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn realized_pnl(&self) -> f64 {
        self.trades.iter().map(TradeRecord::net_pnl).sum()
    }

    pub fn summary(&self) -> LedgerSummary {
        let n = self.trades.len();
        if n == 0 {
            return LedgerSummary::default();
        }
        let (wins, losses): (Vec<f64>, Vec<f64>) = self
            .trades
            .iter()
            .map(TradeRecord::return_pct)
            .partition(|r| *r > 0.0);
        let mean = |v: &[f64]| if v.is_empty() { 0.0 } else { v.iter().sum::<f64>() / v.len() as f64 };
        LedgerSummary {
            trade_count: n,
            winners: wins.len(),
            losers: losses.len(),
            win_rate: wins.len() as f64 / n as f64,
            avg_gain_pct: mean(&wins),
            avg_loss_pct: mean(&losses),
            total_return_pct: self.trades.iter().map(TradeRecord::return_pct).sum(),
            total_pnl: self.realized_pnl(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn ticket(side: Side, hedge: bool, price: f64) -> OpenTicket {
        OpenTicket {
            side,
            hedge,
            entry_time: t(10, 0),
            entry_price: price,
            quantity: 10.0,
            natr: 0.3,
            adx: 25.0,
            indicator_snapshot: BTreeMap::new(),
        }
    }

    #[test]
    fn close_without_ticket_is_none() {
        let mut ledger = TradeLedger::new("SPY");
        assert!(ledger.close(Side::Long, false, t(11, 0), 100.0, ExitReason::Flatten).is_none());
        assert!(ledger.trades().is_empty());
    }

    #[test]
    fn open_close_pairs_by_leg() {
        let mut ledger = TradeLedger::new("SPY");
        ledger.open(ticket(Side::Long, false, 100.0));
        ledger.open(ticket(Side::Short, true, 100.0));
        assert_eq!(ledger.open_tickets().len(), 2);

        let rec = ledger
            .close(Side::Short, true, t(10, 30), 98.0, ExitReason::ExitPercent)
            .unwrap();
        assert!(rec.hedge);
        assert!((rec.net_pnl() - 20.0).abs() < 1e-9);

        ledger.close(Side::Long, false, t(11, 0), 99.0, ExitReason::StopLoss);
        assert!(ledger.open_tickets().is_empty());
        assert_eq!(ledger.trades().len(), 2);
        assert!((ledger.realized_pnl() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn summary_stats() {
        let mut ledger = TradeLedger::new("SPY");
        for (entry, exit) in [(100.0, 102.0), (100.0, 99.0), (100.0, 101.0)] {
            ledger.open(ticket(Side::Long, false, entry));
            ledger.close(Side::Long, false, t(11, 0), exit, ExitReason::ExitPercent);
        }
        let s = ledger.summary();
        assert_eq!(s.trade_count, 3);
        assert_eq!(s.winners, 2);
        assert_eq!(s.losers, 1);
        assert!((s.win_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((s.avg_gain_pct - 1.5).abs() < 1e-9);
        assert!((s.avg_loss_pct + 1.0).abs() < 1e-9);
        assert!((s.total_return_pct - 2.0).abs() < 1e-9);
        assert!((s.total_pnl - 20.0).abs() < 1e-9);
    }

    #[test]
    fn empty_summary_is_zero() {
        assert_eq!(TradeLedger::new("SPY").summary(), LedgerSummary::default());
    }
}
