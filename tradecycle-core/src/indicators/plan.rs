//! Indicator planning: which series the configured ensemble needs, and the
//! computation of the per-history `IndicatorFrame`.
//!
//! The plan is resolved once from the validated configuration. `compute` is a
//! pure function of the bar history and the external series aligned to it, so
//! the batch and streaming drivers see identical frames for identical input.

use crate::adapter::{Indicator, IndicatorFrame, IndicatorSeries, SeriesKey};
use crate::config::{EngineConfig, IndicatorSet, PrimaryIndicator, ReversalCheck, SecondaryIndicator};
use crate::domain::{heikin_ashi, Bar};
use crate::indicators::{
    Adx, AroonOsc, Atr, Band, Bollinger, Chop, DiLine, Dmi, HigherTimeframe, Keltner, Macd,
    MacdLine, Mesa, MesaLine, Mfi, MovingAverage, Roc, Rsi, StochBase, StochLine, Stochastic,
    Supertrend, TtmTrend, Vpt, Vwap, VwapLine,
};

/// Which candles an indicator reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Candles {
    /// Heikin-Ashi when `use_ha_candles` is set, raw bars otherwise.
    Entry,
    /// Always the raw bars (session VWAP, NATR gates).
    Raw,
}

/// Externally supplied series, aligned one value per bar. NaN marks a gap.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalInputs<'a> {
    pub breadth: &'a [f64],
    pub relative_strength: &'a [f64],
}

struct PlannedSeries {
    key: SeriesKey,
    candles: Candles,
    indicator: Box<dyn Indicator>,
}

/// The resolved set of indicators for one engine.
pub struct IndicatorPlan {
    use_ha_candles: bool,
    entries: Vec<PlannedSeries>,
    breadth: bool,
    relative_strength: bool,
}

impl std::fmt::Debug for IndicatorPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndicatorPlan")
            .field("use_ha_candles", &self.use_ha_candles)
            .field(
                "series",
                &self
                    .entries
                    .iter()
                    .map(|e| e.indicator.name().to_string())
                    .collect::<Vec<_>>(),
            )
            .field("breadth", &self.breadth)
            .field("relative_strength", &self.relative_strength)
            .finish()
    }
}

impl IndicatorPlan {
    pub fn new(config: &EngineConfig, set: &IndicatorSet) -> Self {
        let mut plan = Self {
            use_ha_candles: config.use_ha_candles,
            entries: Vec::new(),
            breadth: set.primary == PrimaryIndicator::Breadth,
            relative_strength: set.primary == PrimaryIndicator::RelativeStrength,
        };
        let p = &config.indicators;
        let st = &config.stochastic;

        // Always present: trade records carry NATR and ADX, exits and the
        // resistance filter read the session VWAP.
        plan.push(SeriesKey::Atr, Candles::Raw, Atr::new(p.atr_period));
        plan.push(SeriesKey::Natr, Candles::Raw, Atr::normalized(p.atr_period));
        plan.push(SeriesKey::Adx, Candles::Entry, Adx::new(p.adx_period));
        plan.push(SeriesKey::Vwap, Candles::Raw, Vwap::new(VwapLine::Vwap, p.vwap_band_stddev));
        plan.push(SeriesKey::VwapUpper, Candles::Raw, Vwap::new(VwapLine::Upper, p.vwap_band_stddev));

        let rsi_base = StochBase::Rsi {
            period: st.rsi_period,
            source: st.source,
        };
        let mfi_base = StochBase::Mfi {
            period: st.mfi_period,
        };
        let stoch = |base, line| Stochastic::new(base, st.k_period, st.slow_period, st.d_period, line);

        let wants_stochrsi = set.primary == PrimaryIndicator::StochRsi
            || (config.exits.stochastic_exit && set.primary != PrimaryIndicator::StochMfi);
        if wants_stochrsi {
            plan.push(SeriesKey::StochRsiK, Candles::Entry, stoch(rsi_base, StochLine::K));
            plan.push(SeriesKey::StochRsiD, Candles::Entry, stoch(rsi_base, StochLine::D));
        }
        if set.primary == PrimaryIndicator::StochMfi || set.has(SecondaryIndicator::StochMfi) {
            plan.push(SeriesKey::StochMfiK, Candles::Entry, stoch(mfi_base, StochLine::K));
            plan.push(SeriesKey::StochMfiD, Candles::Entry, stoch(mfi_base, StochLine::D));
        }
        if set.has(SecondaryIndicator::StochRsiHtf) {
            let htf_base = StochBase::Rsi {
                period: st.htf_rsi_period,
                source: st.source,
            };
            for (key, line) in [(SeriesKey::HtfStochK, StochLine::K), (SeriesKey::HtfStochD, StochLine::D)] {
                let inner = Stochastic::new(htf_base, st.htf_k_period, st.slow_period, st.d_period, line);
                plan.push(key, Candles::Entry, HigherTimeframe::new(st.htf_factor, inner));
            }
        }

        if set.has_any(&[SecondaryIndicator::Rsi, SecondaryIndicator::RsiSimple]) {
            plan.push(SeriesKey::Rsi, Candles::Entry, Rsi::new(p.rsi_period, p.rsi_source));
        }
        if set.has_any(&[SecondaryIndicator::Mfi, SecondaryIndicator::MfiSimple]) {
            plan.push(SeriesKey::Mfi, Candles::Entry, Mfi::new(p.mfi_period));
        }
        if set.has_any(&[SecondaryIndicator::Dmi, SecondaryIndicator::DmiSimple]) {
            plan.push(SeriesKey::PlusDi, Candles::Entry, Dmi::new(p.di_period, DiLine::Plus));
            plan.push(SeriesKey::MinusDi, Candles::Entry, Dmi::new(p.di_period, DiLine::Minus));
        }
        if set.primary == PrimaryIndicator::AroonOsc
            || set.has_any(&[SecondaryIndicator::AroonOsc, SecondaryIndicator::AroonOscSimple])
        {
            plan.push(SeriesKey::AroonOsc, Candles::Entry, AroonOsc::new(p.aroonosc_period));
        }
        if set.has(SecondaryIndicator::AroonOscSimple) {
            plan.push(SeriesKey::AroonOscAlt, Candles::Entry, AroonOsc::new(p.aroonosc_alt_period));
        }
        if set.has_any(&[SecondaryIndicator::Macd, SecondaryIndicator::MacdSimple]) {
            for (key, line) in [(SeriesKey::Macd, MacdLine::Macd), (SeriesKey::MacdSignal, MacdLine::Signal)] {
                plan.push(key, Candles::Entry, Macd::new(p.macd_fast, p.macd_slow, p.macd_signal, line));
            }
        }
        if set.has(SecondaryIndicator::Vpt) {
            plan.push(SeriesKey::Vpt, Candles::Entry, Vpt::raw());
            plan.push(SeriesKey::VptSma, Candles::Entry, Vpt::sma(p.vpt_sma_period));
        }
        if set.has_any(&[SecondaryIndicator::Chop, SecondaryIndicator::ChopSimple]) {
            plan.push(SeriesKey::Chop, Candles::Entry, Chop::new(p.chop_period));
        }
        if set.has(SecondaryIndicator::Supertrend) {
            plan.push(
                SeriesKey::Supertrend,
                Candles::Entry,
                Supertrend::new(p.supertrend_atr_period, p.supertrend_multiplier),
            );
        }

        let squeeze = set.has_any(&[SecondaryIndicator::Squeeze, SecondaryIndicator::SqueezeSimple]);
        if squeeze {
            let sq = &config.squeeze;
            for (key, band) in [(SeriesKey::BbUpper, Band::Upper), (SeriesKey::BbLower, Band::Lower)] {
                plan.push(key, Candles::Entry, Bollinger::new(sq.bbands_period, sq.bbands_stddev, sq.source, band));
            }
            for (key, band) in [(SeriesKey::KcUpper, Band::Upper), (SeriesKey::KcLower, Band::Lower)] {
                plan.push(
                    key,
                    Candles::Entry,
                    Keltner::new(sq.kchannel_period, sq.kchannel_atr_period, sq.kchannel_multiplier, sq.source, band),
                );
            }
        }
        if squeeze || set.has(SecondaryIndicator::Roc) || config.exits.roc_exit {
            plan.push(SeriesKey::Roc, Candles::Entry, Roc::new(p.roc_period, p.roc_source));
        }

        let reversal_trend = matches!(config.exits.reversal, ReversalCheck::Trend | ReversalCheck::Combined);
        if set.has(SecondaryIndicator::Trend) || reversal_trend {
            plan.push(SeriesKey::TtmTrend, Candles::Entry, TtmTrend::new(p.trend_period));
        }

        let ma = &config.stacked_ma;
        if set.primary == PrimaryIndicator::StackedMa || set.has(SecondaryIndicator::StackedMa) {
            for (i, period) in ma.periods.iter().enumerate() {
                plan.push(SeriesKey::StackedMa(i), Candles::Entry, MovingAverage::new(ma.ma_type, *period, ma.source));
            }
        }
        if config.exits.trend_quick_exit {
            for (i, period) in ma.quick_exit_periods.iter().enumerate() {
                plan.push(
                    SeriesKey::QuickExitMa(i),
                    Candles::Entry,
                    MovingAverage::new(ma.quick_exit_ma_type, *period, ma.source),
                );
            }
        }

        let mesa = &config.mesa;
        if set.primary == PrimaryIndicator::MamaFama || set.has(SecondaryIndicator::MamaFama) {
            plan.push(SeriesKey::Mama, Candles::Entry, Mesa::mama(MesaLine::Mama, mesa.source));
            plan.push(SeriesKey::Fama, Candles::Entry, Mesa::mama(MesaLine::Fama, mesa.source));
        }
        if set.primary == PrimaryIndicator::MesaSine
            || set.has(SecondaryIndicator::MesaSine)
            || config.exits.mesa_sine_exit
        {
            plan.push(SeriesKey::Sine, Candles::Entry, Mesa::sine(MesaLine::Sine, mesa.source, mesa.sine_period));
            plan.push(SeriesKey::Lead, Candles::Entry, Mesa::sine(MesaLine::Lead, mesa.source, mesa.sine_period));
        }
        plan
    }

    fn push(&mut self, key: SeriesKey, candles: Candles, indicator: impl Indicator + 'static) {
        self.entries.push(PlannedSeries {
            key,
            candles,
            indicator: Box::new(indicator),
        });
    }

    /// Longest lookback across every planned indicator.
    pub fn warmup(&self) -> usize {
        self.entries
            .iter()
            .map(|e| e.indicator.lookback())
            .max()
            .unwrap_or(0)
    }

    pub fn keys(&self) -> impl Iterator<Item = SeriesKey> + '_ {
        self.entries.iter().map(|e| e.key)
    }

    /// Compute every planned series over `bars`.
    pub fn compute(&self, bars: &[Bar], external: ExternalInputs<'_>) -> IndicatorFrame {
        let ha = heikin_ashi(bars);
        let entry_bars: &[Bar] = if self.use_ha_candles { &ha } else { bars };

        let mut frame = IndicatorFrame::new(bars.len());
        for entry in &self.entries {
            let input = match entry.candles {
                Candles::Entry => entry_bars,
                Candles::Raw => bars,
            };
            let series = entry.indicator.series(input);
            debug_assert!(
                series.end() <= bars.len(),
                "indicator '{}' produced values past bar {}",
                entry.indicator.name(),
                bars.len()
            );
            frame.insert(entry.key, series);
        }

        frame.insert(SeriesKey::HaOpen, IndicatorSeries::new(0, ha.iter().map(|b| b.open).collect()));
        frame.insert(SeriesKey::HaClose, IndicatorSeries::new(0, ha.iter().map(|b| b.close).collect()));

        if self.breadth {
            frame.insert(SeriesKey::Breadth, external_series(external.breadth, bars.len()));
        }
        if self.relative_strength {
            frame.insert(
                SeriesKey::RelativeStrength,
                external_series(external.relative_strength, bars.len()),
            );
        }
        frame
    }
}

fn external_series(values: &[f64], bar_count: usize) -> IndicatorSeries {
    IndicatorSeries::new(0, values.iter().take(bar_count).copied().collect())
}

/// Plan and compute in one call.
pub fn build_frame(
    config: &EngineConfig,
    set: &IndicatorSet,
    bars: &[Bar],
    external: ExternalInputs<'_>,
) -> IndicatorFrame {
    IndicatorPlan::new(config, set).compute(bars, external)
}
