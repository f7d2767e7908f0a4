//! Synthetic minute bars for development and demos.
//!
//! A deterministic random walk over regular-hours sessions. The RNG is
//! seeded from BLAKE3 over the symbol and seed, so the same pair always
//! yields the same bars and different symbols diverge.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tradecycle_core::domain::Bar;

/// Minutes in a regular session (09:30 to 15:59 inclusive).
pub const SESSION_MINUTES: i64 = 390;

fn first_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap_or(NaiveDate::MIN)
}

fn rng_for(symbol: &str, seed: u64) -> StdRng {
    let mut hasher = blake3::Hasher::new();
    hasher.update(symbol.as_bytes());
    hasher.update(&seed.to_le_bytes());
    StdRng::from_seed(*hasher.finalize().as_bytes())
}

/// `days` weekday sessions of 1-minute bars starting 2024-01-02.
pub fn minute_bars(symbol: &str, seed: u64, days: usize) -> Vec<Bar> {
    let mut rng = rng_for(symbol, seed);
    let mut bars = Vec::with_capacity(days * SESSION_MINUTES as usize);
    let mut price = 100.0_f64;
    // Slow regime drift so some sessions trend and some chop.
    let mut drift = 0.0_f64;
    let mut day = first_day();
    let mut produced = 0;

    while produced < days {
        if matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            day += Duration::days(1);
            continue;
        }
        let Some(open_time) = day.and_hms_opt(9, 30, 0) else {
            break;
        };
        drift = (drift + rng.gen_range(-0.004..0.004)).clamp(-0.01, 0.01);
        for minute in 0..SESSION_MINUTES {
            let step: f64 = rng.gen_range(-0.08..0.08) + drift;
            let open = price;
            let close = (price * (1.0 + step / 100.0)).max(1.0);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.0006));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.0006));
            bars.push(Bar {
                timestamp: open_time + Duration::minutes(minute),
                open,
                high,
                low,
                close,
                volume: rng.gen_range(2_000..40_000u64),
            });
            price = close;
        }
        produced += 1;
        day += Duration::days(1);
    }

    bars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_per_symbol_and_seed() {
        let a = minute_bars("SPY", 1, 2);
        let b = minute_bars("SPY", 1, 2);
        assert_eq!(a, b);
        assert_ne!(a, minute_bars("QQQ", 1, 2));
        assert_ne!(a, minute_bars("SPY", 2, 2));
    }

    #[test]
    fn sessions_skip_weekends_and_stay_in_hours() {
        let bars = minute_bars("SPY", 0, 5);
        assert_eq!(bars.len(), 5 * SESSION_MINUTES as usize);
        for bar in &bars {
            assert!(!matches!(bar.timestamp.weekday(), Weekday::Sat | Weekday::Sun));
            let t = bar.time();
            assert!(t >= chrono::NaiveTime::from_hms_opt(9, 30, 0).unwrap());
            assert!(t < chrono::NaiveTime::from_hms_opt(16, 0, 0).unwrap());
            assert!(bar.is_sane());
        }
        assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }
}
