//! Candle-pattern gate: a pass-through of an externally detected pattern.

use super::SignalState;
use crate::domain::Side;
use serde::{Deserialize, Serialize};

/// One bar's pattern verdict from a `PatternSource`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PatternSignal {
    pub bullish: bool,
    pub bearish: bool,
    /// Pattern reliability rank; higher is stronger.
    pub rank: u32,
}

/// Confirmed when the pattern points toward `side` with at least `min_rank`.
/// No pattern for the bar means not confirmed.
pub fn evaluate_pattern(side: Side, pattern: Option<PatternSignal>, min_rank: Option<u32>) -> SignalState {
    let confirmed = pattern.is_some_and(|p| {
        let direction = match side {
            Side::Long => p.bullish,
            Side::Short => p.bearish,
        };
        direction && min_rank.map_or(true, |min| p.rank >= min)
    });
    SignalState {
        raw: confirmed,
        confirmed,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_direction_and_rank() {
        let bull = PatternSignal {
            bullish: true,
            bearish: false,
            rank: 3,
        };
        assert!(evaluate_pattern(Side::Long, Some(bull), None).confirmed);
        assert!(!evaluate_pattern(Side::Short, Some(bull), None).confirmed);
        assert!(evaluate_pattern(Side::Long, Some(bull), Some(3)).confirmed);
        assert!(!evaluate_pattern(Side::Long, Some(bull), Some(4)).confirmed);
        assert!(!evaluate_pattern(Side::Long, None, None).confirmed);
    }
}
