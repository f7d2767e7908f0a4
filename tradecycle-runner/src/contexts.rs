//! Resistance contexts derived from an instrument's own bars.
//!
//! Each session gets a [`DailyContext`] built from the session before it.
//! Each week gets a [`WeeklyContext`] whose key levels come from the daily
//! aggregates that closed before the week's first session, so nothing the
//! week itself trades is visible to it.

use chrono::{Datelike, NaiveDate};
use tracing::debug;
use tradecycle_core::context::{DailyContext, WeeklyContext};
use tradecycle_core::domain::Bar;
use tradecycle_core::indicators::{daily, key_levels};
use tradecycle_core::ContextBook;

/// Knobs for context derivation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextOptions {
    pub tick_size: f64,
    pub key_level_days: usize,
    pub atr_period: usize,
}

/// Index ranges of consecutive bars sharing a calendar date.
fn sessions(bars: &[Bar]) -> Vec<(NaiveDate, std::ops::Range<usize>)> {
    let mut out = Vec::new();
    let mut start = 0;
    for i in 1..=bars.len() {
        if i == bars.len() || bars[i].date() != bars[start].date() {
            out.push((bars[start].date(), start..i));
            start = i;
        }
    }
    out
}

fn week_of(date: NaiveDate) -> (i32, u32) {
    let week = date.iso_week();
    (week.year(), week.week())
}

pub fn build_contexts(bars: &[Bar], opts: &ContextOptions) -> ContextBook {
    let mut book = ContextBook::new();
    if bars.is_empty() {
        return book;
    }

    let sessions = sessions(bars);
    for pair in sessions.windows(2) {
        let (_, prior) = &pair[0];
        let (date, _) = &pair[1];
        if let Some(ctx) = DailyContext::from_prior_session(*date, &bars[prior.clone()], opts.tick_size) {
            book.insert_daily(ctx);
        }
    }

    let days = daily(bars);
    let mut current_week = None;
    for (date, _) in &sessions {
        let week = week_of(*date);
        if current_week == Some(week) {
            continue;
        }
        current_week = Some(week);
        let closed = days.partition_point(|d| d.date() < *date);
        let from = closed.saturating_sub(opts.key_level_days);
        let levels = key_levels(&days[from..closed], opts.atr_period);
        debug!(week_start = %date, levels = levels.len(), "weekly key levels");
        book.insert_weekly(*date, WeeklyContext::new(levels));
    }

    book
}
