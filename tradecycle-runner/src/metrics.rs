//! Performance metrics: pure functions that compute run statistics.
//!
//! Every metric is a pure function: equity curve and/or trade list in, scalar out.
//! The equity curve is realized-only, sampled once per session close.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tradecycle_core::domain::{ExitReason, Side, TradeRecord};

/// Aggregate performance metrics for one instrument run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
    pub long_trades: usize,
    pub short_trades: usize,
    pub hedge_trades: usize,
    pub stop_losses: usize,
    pub avg_hold_minutes: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub avg_losing_streak: f64,
}

impl PerformanceMetrics {
    /// Compute all metrics from a session equity curve and trade list.
    pub fn compute(equity_curve: &[f64], trades: &[TradeRecord]) -> Self {
        Self {
            total_return: total_return(equity_curve),
            sharpe: sharpe_ratio(equity_curve),
            sortino: sortino_ratio(equity_curve),
            max_drawdown: max_drawdown(equity_curve),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            trade_count: trades.len(),
            long_trades: trades.iter().filter(|t| t.side == Side::Long).count(),
            short_trades: trades.iter().filter(|t| t.side == Side::Short).count(),
            hedge_trades: trades.iter().filter(|t| t.hedge).count(),
            stop_losses: trades
                .iter()
                .filter(|t| t.exit_reason == ExitReason::StopLoss)
                .count(),
            avg_hold_minutes: avg_hold_minutes(trades),
            max_consecutive_wins: max_consecutive(trades, true),
            max_consecutive_losses: max_consecutive(trades, false),
            avg_losing_streak: avg_losing_streak(trades),
        }
    }
}

// ─── Equity ─────────────────────────────────────────────────────────

/// Capital plus realized P&L at the close of each session in `sessions`.
/// A trade counts toward the session its exit falls in.
pub fn session_equity(sessions: &[NaiveDate], trades: &[TradeRecord], initial_capital: f64) -> Vec<f64> {
    let mut exits: Vec<(NaiveDate, f64)> = trades
        .iter()
        .map(|t| (t.exit_time.date(), t.net_pnl()))
        .collect();
    exits.sort_by_key(|(date, _)| *date);

    let mut curve = Vec::with_capacity(sessions.len() + 1);
    curve.push(initial_capital);
    let mut equity = initial_capital;
    let mut next = 0;
    for date in sessions {
        while next < exits.len() && exits[next].0 <= *date {
            equity += exits[next].1;
            next += 1;
        }
        curve.push(equity);
    }
    curve
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(&initial), Some(&last)) if equity_curve.len() >= 2 && initial > 0.0 => {
            (last - initial) / initial
        }
        _ => 0.0,
    }
}

/// Annualized Sharpe ratio of session returns, zero risk-free rate.
/// Returns 0.0 for zero variance or fewer than two returns.
pub fn sharpe_ratio(equity_curve: &[f64]) -> f64 {
    let returns = session_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / std * 252.0_f64.sqrt()
}

/// Annualized Sortino ratio (downside deviation only).
pub fn sortino_ratio(equity_curve: &[f64]) -> f64 {
    let returns = session_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let downside: f64 = returns.iter().filter(|r| **r < 0.0).map(|r| r * r).sum();
    if downside == 0.0 {
        return 0.0;
    }
    let downside_std = (downside / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / downside_std * 252.0_f64.sqrt()
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

/// Gross profits / gross losses, capped at 100.0 when nothing was lost.
pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let (profit, loss) = trades.iter().fold((0.0, 0.0), |(p, l), t| {
        let pnl = t.net_pnl();
        if pnl > 0.0 {
            (p + pnl, l)
        } else {
            (p, l - pnl)
        }
    });
    if loss < 1e-10 {
        return if profit > 0.0 { 100.0 } else { 0.0 };
    }
    (profit / loss).min(100.0)
}

pub fn avg_hold_minutes(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let total: i64 = trades
        .iter()
        .map(|t| (t.exit_time - t.entry_time).num_minutes())
        .sum();
    total as f64 / trades.len() as f64
}

/// Average length of losing streaks.
pub fn avg_losing_streak(trades: &[TradeRecord]) -> f64 {
    let mut streaks = Vec::new();
    let mut current = 0usize;
    for trade in trades {
        if trade.is_winner() {
            if current > 0 {
                streaks.push(current);
            }
            current = 0;
        } else {
            current += 1;
        }
    }
    if current > 0 {
        streaks.push(current);
    }
    if streaks.is_empty() {
        return 0.0;
    }
    streaks.iter().sum::<usize>() as f64 / streaks.len() as f64
}

// ─── Helpers ────────────────────────────────────────────────────────

pub fn session_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn max_consecutive(trades: &[TradeRecord], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for trade in trades {
        if trade.is_winner() == winners {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDateTime};
    use std::collections::BTreeMap;

    fn at(day: u32, minute: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
            + Duration::minutes(minute)
    }

    /// A 10-share trade with the given per-share move.
    fn trade(side: Side, day: u32, per_share: f64) -> TradeRecord {
        let exit_price = match side {
            Side::Long => 100.0 + per_share,
            Side::Short => 100.0 - per_share,
        };
        TradeRecord {
            symbol: "SPY".into(),
            side,
            hedge: false,
            entry_time: at(day, 0),
            entry_price: 100.0,
            natr: 0.2,
            adx: 25.0,
            indicator_snapshot: BTreeMap::new(),
            exit_time: at(day, 30),
            exit_price,
            exit_reason: if per_share < 0.0 { ExitReason::StopLoss } else { ExitReason::ExitPercent },
            quantity: 10.0,
        }
    }

    fn dates(days: &[u32]) -> Vec<NaiveDate> {
        days.iter().map(|d| NaiveDate::from_ymd_opt(2024, 1, *d).unwrap()).collect()
    }

    #[test]
    fn equity_steps_on_exit_sessions() {
        let trades = vec![trade(Side::Long, 2, 1.0), trade(Side::Short, 4, -0.5)];
        let curve = session_equity(&dates(&[2, 3, 4, 5]), &trades, 1000.0);
        assert_eq!(curve, vec![1000.0, 1010.0, 1010.0, 1005.0, 1005.0]);
    }

    #[test]
    fn total_return_and_drawdown() {
        let curve = [100.0, 120.0, 90.0, 110.0];
        assert!((total_return(&curve) - 0.1).abs() < 1e-12);
        assert!((max_drawdown(&curve) - (-0.25)).abs() < 1e-12);
        assert_eq!(max_drawdown(&[100.0, 101.0, 102.0]), 0.0);
        assert_eq!(total_return(&[100.0]), 0.0);
        assert_eq!(total_return(&[]), 0.0);
    }

    #[test]
    fn sharpe_and_sortino_degenerate_cases() {
        assert_eq!(sharpe_ratio(&[100.0, 100.0, 100.0]), 0.0);
        assert_eq!(sortino_ratio(&[100.0, 101.0, 102.0]), 0.0);
        assert!(sharpe_ratio(&[100.0, 101.0, 100.5, 102.0]) > 0.0);
        assert!(sortino_ratio(&[100.0, 101.0, 100.5, 102.0]) > 0.0);
    }

    #[test]
    fn trade_statistics() {
        let trades = vec![
            trade(Side::Long, 2, 1.0),
            trade(Side::Short, 2, 2.0),
            trade(Side::Long, 3, -1.0),
            trade(Side::Long, 3, -0.5),
            trade(Side::Short, 4, 0.5),
            trade(Side::Long, 4, -1.0),
        ];
        assert!((win_rate(&trades) - 0.5).abs() < 1e-12);
        // Profit 35, loss 25.
        assert!((profit_factor(&trades) - 1.4).abs() < 1e-12);
        assert_eq!(max_consecutive(&trades, true), 2);
        assert_eq!(max_consecutive(&trades, false), 2);
        assert!((avg_losing_streak(&trades) - 1.5).abs() < 1e-12);
        assert_eq!(avg_hold_minutes(&trades), 30.0);

        let m = PerformanceMetrics::compute(&session_equity(&dates(&[2, 3, 4]), &trades, 1000.0), &trades);
        assert_eq!(m.trade_count, 6);
        assert_eq!(m.long_trades, 4);
        assert_eq!(m.short_trades, 2);
        assert_eq!(m.stop_losses, 3);
        assert!((m.total_return - 0.01).abs() < 1e-12);
    }

    #[test]
    fn profit_factor_edges() {
        assert_eq!(profit_factor(&[]), 0.0);
        assert_eq!(profit_factor(&[trade(Side::Long, 2, 1.0)]), 100.0);
        assert_eq!(profit_factor(&[trade(Side::Long, 2, -1.0)]), 0.0);
    }

    #[test]
    fn empty_run() {
        let m = PerformanceMetrics::compute(&[1000.0], &[]);
        assert_eq!(m.trade_count, 0);
        assert_eq!(m.total_return, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
        assert_eq!(m.win_rate, 0.0);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn arb_curve() -> impl Strategy<Value = Vec<f64>> {
            prop::collection::vec(1.0f64..10_000.0, 0..60)
        }

        fn arb_moves() -> impl Strategy<Value = Vec<(u32, f64)>> {
            prop::collection::vec((2u32..20, -5.0f64..5.0), 0..20)
        }

        proptest! {
            #[test]
            fn drawdown_is_a_bounded_loss(curve in arb_curve()) {
                let dd = max_drawdown(&curve);
                prop_assert!(dd <= 0.0);
                prop_assert!(dd > -1.0);
            }

            #[test]
            fn session_equity_ends_at_realized_pnl(moves in arb_moves()) {
                let trades: Vec<TradeRecord> = moves
                    .iter()
                    .map(|(day, per_share)| trade(Side::Long, *day, *per_share))
                    .collect();
                let sessions: Vec<u32> = (2..20).collect();
                let curve = session_equity(&dates(&sessions), &trades, 1000.0);
                prop_assert_eq!(curve.len(), sessions.len() + 1);
                let realized: f64 = trades.iter().map(|t| t.net_pnl()).sum();
                let last = curve[curve.len() - 1];
                prop_assert!((last - 1000.0 - realized).abs() < 1e-6);
            }
        }
    }
}
