//! Directional movement: +DI, -DI and ADX (Wilder).
//!
//! 1. +DM / -DM from consecutive highs and lows
//! 2. Wilder-smooth +DM, -DM and TR
//! 3. ±DI = 100 * smoothed(±DM) / smoothed(TR)
//! 4. DX = 100 * |+DI - -DI| / (+DI + -DI), ADX = Wilder-smoothed DX

use crate::adapter::Indicator;
use crate::domain::Bar;
use crate::indicators::atr::{true_range, wilder_smooth};

/// `(+DI, -DI)` series.
pub fn di_series(bars: &[Bar], period: usize) -> (Vec<f64>, Vec<f64>) {
    let n = bars.len();
    let mut plus_dm = vec![f64::NAN; n];
    let mut minus_dm = vec![f64::NAN; n];
    for i in 1..n {
        let up = bars[i].high - bars[i - 1].high;
        let down = bars[i - 1].low - bars[i].low;
        plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
        minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
    }
    let mut tr = true_range(bars);
    if let Some(first) = tr.first_mut() {
        *first = f64::NAN;
    }
    let s_tr = wilder_smooth(&tr, period);
    let s_plus = wilder_smooth(&plus_dm, period);
    let s_minus = wilder_smooth(&minus_dm, period);

    let mut plus_di = vec![f64::NAN; n];
    let mut minus_di = vec![f64::NAN; n];
    for i in 0..n {
        if s_tr[i].is_nan() || s_tr[i] == 0.0 {
            continue;
        }
        plus_di[i] = 100.0 * s_plus[i] / s_tr[i];
        minus_di[i] = 100.0 * s_minus[i] / s_tr[i];
    }
    (plus_di, minus_di)
}

pub fn adx_series(bars: &[Bar], period: usize) -> Vec<f64> {
    let (plus_di, minus_di) = di_series(bars, period);
    let dx: Vec<f64> = plus_di
        .iter()
        .zip(&minus_di)
        .map(|(p, m)| {
            let sum = p + m;
            if sum.is_nan() {
                f64::NAN
            } else if sum == 0.0 {
                0.0
            } else {
                100.0 * (p - m).abs() / sum
            }
        })
        .collect();
    wilder_smooth(&dx, period)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiLine {
    Plus,
    Minus,
}

#[derive(Debug, Clone)]
pub struct Dmi {
    period: usize,
    line: DiLine,
    name: String,
}

impl Dmi {
    pub fn new(period: usize, line: DiLine) -> Self {
        assert!(period >= 1, "DI period must be >= 1");
        let tag = match line {
            DiLine::Plus => "plus",
            DiLine::Minus => "minus",
        };
        Self {
            period,
            line,
            name: format!("{tag}_di_{period}"),
        }
    }
}

impl Indicator for Dmi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let (plus, minus) = di_series(bars, self.period);
        match self.line {
            DiLine::Plus => plus,
            DiLine::Minus => minus,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    name: String,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ADX period must be >= 1");
        Self {
            period,
            name: format!("adx_{period}"),
        }
    }
}

impl Indicator for Adx {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        2 * self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        adx_series(bars, self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    #[test]
    fn uptrend_has_plus_di_above_minus_di() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let bars = make_bars(&closes);
        let (plus, minus) = di_series(&bars, 5);
        assert!(plus[39] > minus[39]);
    }

    #[test]
    fn adx_strong_trend_is_high_and_bounded() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + 2.0 * i as f64).collect();
        let adx = Adx::new(5).compute(&make_bars(&closes));
        assert!(adx[..9].iter().all(|v| v.is_nan()));
        let last = adx[59];
        assert!(last > 25.0 && last <= 100.0, "adx = {last}");
    }
}
