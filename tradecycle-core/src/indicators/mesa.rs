//! Ehlers cycle indicators: MESA Adaptive Moving Average (MAMA/FAMA) and the
//! MESA sine wave with its 45-degree lead line.

use crate::adapter::Indicator;
use crate::domain::{Bar, PriceSource};
use std::f64::consts::PI;

/// Bars discarded while the homodyne discriminator settles.
const MAMA_WARMUP: usize = 32;

fn at(values: &[f64], i: usize, back: usize) -> f64 {
    if i >= back {
        values[i - back]
    } else {
        0.0
    }
}

fn hilbert(values: &[f64], i: usize, period: f64) -> f64 {
    (0.0962 * at(values, i, 0) + 0.5769 * at(values, i, 2)
        - 0.5769 * at(values, i, 4)
        - 0.0962 * at(values, i, 6))
        * (0.075 * period + 0.54)
}

/// `(mama, fama)` with the usual fast/slow limits.
pub fn mama_fama_series(prices: &[f64], fast_limit: f64, slow_limit: f64) -> (Vec<f64>, Vec<f64>) {
    let n = prices.len();
    let mut mama_out = vec![f64::NAN; n];
    let mut fama_out = vec![f64::NAN; n];
    let mut smooth = vec![0.0; n];
    let mut detrender = vec![0.0; n];
    let mut i1 = vec![0.0; n];
    let mut q1 = vec![0.0; n];
    let (mut i2_prev, mut q2_prev) = (0.0, 0.0);
    let (mut re_prev, mut im_prev) = (0.0, 0.0);
    let mut period = 0.0f64;
    let mut phase_prev = 0.0;
    let (mut mama, mut fama) = (0.0, 0.0);

    for i in 0..n {
        if prices[i].is_nan() {
            break;
        }
        if i < 6 {
            mama = prices[i];
            fama = prices[i];
            continue;
        }
        smooth[i] = (4.0 * prices[i] + 3.0 * prices[i - 1] + 2.0 * prices[i - 2] + prices[i - 3])
            / 10.0;
        detrender[i] = hilbert(&smooth, i, period);
        q1[i] = hilbert(&detrender, i, period);
        i1[i] = at(&detrender, i, 3);

        let ji = hilbert(&i1, i, period);
        let jq = hilbert(&q1, i, period);
        let i2 = 0.2 * (i1[i] - jq) + 0.8 * i2_prev;
        let q2 = 0.2 * (q1[i] + ji) + 0.8 * q2_prev;

        let re = 0.2 * (i2 * i2_prev + q2 * q2_prev) + 0.8 * re_prev;
        let im = 0.2 * (i2 * q2_prev - q2 * i2_prev) + 0.8 * im_prev;
        i2_prev = i2;
        q2_prev = q2;
        re_prev = re;
        im_prev = im;

        let prev_period = period;
        if im != 0.0 && re != 0.0 {
            period = 360.0 / (im / re).atan().to_degrees();
        }
        if prev_period > 0.0 {
            period = period.min(1.5 * prev_period).max(0.67 * prev_period);
        }
        period = period.clamp(6.0, 50.0);
        period = 0.2 * period + 0.8 * prev_period;

        let phase = if i1[i] != 0.0 {
            (q1[i] / i1[i]).atan().to_degrees()
        } else {
            phase_prev
        };
        let delta_phase = (phase_prev - phase).max(1.0);
        phase_prev = phase;
        let alpha = (fast_limit / delta_phase).clamp(slow_limit, fast_limit);

        mama = alpha * prices[i] + (1.0 - alpha) * mama;
        fama = 0.5 * alpha * mama + (1.0 - 0.5 * alpha) * fama;
        if i >= MAMA_WARMUP {
            mama_out[i] = mama;
            fama_out[i] = fama;
        }
    }
    (mama_out, fama_out)
}

/// `(sine, lead)` from a single-period discrete Fourier phase estimate.
pub fn mesa_sine_series(prices: &[f64], period: usize) -> (Vec<f64>, Vec<f64>) {
    let n = prices.len();
    let mut sine = vec![f64::NAN; n];
    let mut lead = vec![f64::NAN; n];
    if period == 0 {
        return (sine, lead);
    }
    let p = period as f64;
    for idx in (period + 1)..n {
        let mut real = 0.0;
        let mut imag = 0.0;
        for i in 0..period {
            let angle = 2.0 * PI * (i + 1) as f64 / p;
            real += prices[idx - i] * angle.cos();
            imag += prices[idx - i] * angle.sin();
        }
        if real.is_nan() || imag.is_nan() {
            continue;
        }
        let mut phase = if real.abs() > 0.001 {
            (imag / real).atan()
        } else {
            PI / 2.0 * imag.signum()
        };
        if real < 0.0 {
            phase += PI;
        }
        if phase < 0.0 {
            phase += 2.0 * PI;
        } else if phase > 2.0 * PI {
            phase -= 2.0 * PI;
        }
        sine[idx] = phase.cos();
        lead[idx] = (phase + PI / 4.0).cos();
    }
    (sine, lead)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MesaLine {
    Mama,
    Fama,
    Sine,
    Lead,
}

#[derive(Debug, Clone)]
pub struct Mesa {
    line: MesaLine,
    source: PriceSource,
    sine_period: usize,
    name: String,
}

impl Mesa {
    pub fn mama(line: MesaLine, source: PriceSource) -> Self {
        Self {
            line,
            source,
            sine_period: 0,
            name: format!("{line:?}").to_lowercase(),
        }
    }

    pub fn sine(line: MesaLine, source: PriceSource, period: usize) -> Self {
        assert!(period >= 1, "MESA sine period must be >= 1");
        Self {
            line,
            source,
            sine_period: period,
            name: format!("mesa_{}_{period}", format!("{line:?}").to_lowercase()),
        }
    }
}

impl Indicator for Mesa {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        match self.line {
            MesaLine::Mama | MesaLine::Fama => MAMA_WARMUP,
            MesaLine::Sine | MesaLine::Lead => self.sine_period + 1,
        }
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let prices: Vec<f64> = bars.iter().map(|b| b.price(self.source)).collect();
        match self.line {
            MesaLine::Mama => mama_fama_series(&prices, 0.5, 0.05).0,
            MesaLine::Fama => mama_fama_series(&prices, 0.5, 0.05).1,
            MesaLine::Sine => mesa_sine_series(&prices, self.sine_period).0,
            MesaLine::Lead => mesa_sine_series(&prices, self.sine_period).1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_and_lead_are_bounded() {
        let prices: Vec<f64> = (0..120).map(|i| 100.0 + (i as f64 * 0.25).sin() * 5.0).collect();
        let (sine, lead) = mesa_sine_series(&prices, 25);
        assert!(sine[25].is_nan());
        for i in 26..120 {
            assert!((-1.0..=1.0).contains(&sine[i]));
            assert!((-1.0..=1.0).contains(&lead[i]));
        }
    }

    #[test]
    fn mama_tracks_a_rising_market() {
        let prices: Vec<f64> = (0..100).map(|i| 100.0 + i as f64 * 0.5).collect();
        let (mama, fama) = mama_fama_series(&prices, 0.5, 0.05);
        assert!(mama[MAMA_WARMUP - 1].is_nan());
        assert!(mama[99] > fama[99]);
        assert!(mama[99] <= prices[99]);
    }

    #[test]
    fn prefix_matches_full() {
        let prices: Vec<f64> = (0..80).map(|i| 50.0 + (i as f64 * 0.3).cos() * 2.0).collect();
        let (full, _) = mama_fama_series(&prices, 0.5, 0.05);
        let (prefix, _) = mama_fama_series(&prices[..60], 0.5, 0.05);
        for i in MAMA_WARMUP..60 {
            assert_eq!(full[i].to_bits(), prefix[i].to_bits());
        }
    }
}
