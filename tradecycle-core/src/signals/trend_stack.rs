//! Stacked-value ordering check shared by the stacked moving average signals,
//! the trend quick exit and the relative-strength primary.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Affinity {
    /// Each value greater than the next.
    Bull,
    /// Each value less than the next.
    Bear,
}

/// True iff every adjacent pair is strictly ordered in the `affinity` direction.
/// Fewer than two values, or any NaN, is false.
pub fn evaluate_trend_stack(values: &[f64], affinity: Affinity) -> bool {
    if values.len() < 2 || values.iter().any(|v| v.is_nan()) {
        return false;
    }
    values.windows(2).all(|w| match affinity {
        Affinity::Bull => w[0] > w[1],
        Affinity::Bear => w[0] < w[1],
    })
}
