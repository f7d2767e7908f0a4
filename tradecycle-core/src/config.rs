//! Engine configuration.
//!
//! Every option has a default; a TOML or JSON table only needs to name what it
//! changes. `EngineConfig::validate` runs once when the engine is constructed
//! and resolves indicator names into typed selections. Nothing downstream
//! re-checks configuration.

use crate::domain::PriceSource;
use crate::error::ConfigError;
use crate::indicators::ma::MaType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ─── Indicator selection ─────────────────────────────────────────────

/// The indicator that drives entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimaryIndicator {
    StochRsi,
    StochMfi,
    StackedMa,
    AroonOsc,
    MamaFama,
    MesaSine,
    Breadth,
    RelativeStrength,
}

impl PrimaryIndicator {
    pub const ALL: [PrimaryIndicator; 8] = [
        PrimaryIndicator::StochRsi,
        PrimaryIndicator::StochMfi,
        PrimaryIndicator::StackedMa,
        PrimaryIndicator::AroonOsc,
        PrimaryIndicator::MamaFama,
        PrimaryIndicator::MesaSine,
        PrimaryIndicator::Breadth,
        PrimaryIndicator::RelativeStrength,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PrimaryIndicator::StochRsi => "stochrsi",
            PrimaryIndicator::StochMfi => "stochmfi",
            PrimaryIndicator::StackedMa => "stacked_ma",
            PrimaryIndicator::AroonOsc => "aroonosc",
            PrimaryIndicator::MamaFama => "mama_fama",
            PrimaryIndicator::MesaSine => "mesa_sine",
            PrimaryIndicator::Breadth => "breadth",
            PrimaryIndicator::RelativeStrength => "relative_strength",
        }
    }
}

impl FromStr for PrimaryIndicator {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| ConfigError::UnknownIndicator(s.to_string()))
    }
}

impl fmt::Display for PrimaryIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An entry confirmation gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SecondaryIndicator {
    Rsi,
    RsiSimple,
    Mfi,
    MfiSimple,
    Adx,
    Dmi,
    DmiSimple,
    AroonOsc,
    AroonOscSimple,
    Macd,
    MacdSimple,
    Vwap,
    Vpt,
    Chop,
    ChopSimple,
    Supertrend,
    Squeeze,
    SqueezeSimple,
    StackedMa,
    MamaFama,
    MesaSine,
    Roc,
    StochMfi,
    StochRsiHtf,
    Trend,
    Pattern,
}

impl SecondaryIndicator {
    pub const ALL: [SecondaryIndicator; 26] = [
        SecondaryIndicator::Rsi,
        SecondaryIndicator::RsiSimple,
        SecondaryIndicator::Mfi,
        SecondaryIndicator::MfiSimple,
        SecondaryIndicator::Adx,
        SecondaryIndicator::Dmi,
        SecondaryIndicator::DmiSimple,
        SecondaryIndicator::AroonOsc,
        SecondaryIndicator::AroonOscSimple,
        SecondaryIndicator::Macd,
        SecondaryIndicator::MacdSimple,
        SecondaryIndicator::Vwap,
        SecondaryIndicator::Vpt,
        SecondaryIndicator::Chop,
        SecondaryIndicator::ChopSimple,
        SecondaryIndicator::Supertrend,
        SecondaryIndicator::Squeeze,
        SecondaryIndicator::SqueezeSimple,
        SecondaryIndicator::StackedMa,
        SecondaryIndicator::MamaFama,
        SecondaryIndicator::MesaSine,
        SecondaryIndicator::Roc,
        SecondaryIndicator::StochMfi,
        SecondaryIndicator::StochRsiHtf,
        SecondaryIndicator::Trend,
        SecondaryIndicator::Pattern,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SecondaryIndicator::Rsi => "rsi",
            SecondaryIndicator::RsiSimple => "rsi_simple",
            SecondaryIndicator::Mfi => "mfi",
            SecondaryIndicator::MfiSimple => "mfi_simple",
            SecondaryIndicator::Adx => "adx",
            SecondaryIndicator::Dmi => "dmi",
            SecondaryIndicator::DmiSimple => "dmi_simple",
            SecondaryIndicator::AroonOsc => "aroonosc",
            SecondaryIndicator::AroonOscSimple => "aroonosc_simple",
            SecondaryIndicator::Macd => "macd",
            SecondaryIndicator::MacdSimple => "macd_simple",
            SecondaryIndicator::Vwap => "vwap",
            SecondaryIndicator::Vpt => "vpt",
            SecondaryIndicator::Chop => "chop",
            SecondaryIndicator::ChopSimple => "chop_simple",
            SecondaryIndicator::Supertrend => "supertrend",
            SecondaryIndicator::Squeeze => "squeeze",
            SecondaryIndicator::SqueezeSimple => "squeeze_simple",
            SecondaryIndicator::StackedMa => "stacked_ma",
            SecondaryIndicator::MamaFama => "mama_fama",
            SecondaryIndicator::MesaSine => "mesa_sine",
            SecondaryIndicator::Roc => "roc",
            SecondaryIndicator::StochMfi => "stochmfi",
            SecondaryIndicator::StochRsiHtf => "stochrsi_htf",
            SecondaryIndicator::Trend => "trend",
            SecondaryIndicator::Pattern => "pattern",
        }
    }

    /// The simple and full variants of one indicator are mutually exclusive.
    fn family(self) -> &'static str {
        match self {
            SecondaryIndicator::Rsi | SecondaryIndicator::RsiSimple => "rsi",
            SecondaryIndicator::Mfi | SecondaryIndicator::MfiSimple => "mfi",
            SecondaryIndicator::Dmi | SecondaryIndicator::DmiSimple => "dmi",
            SecondaryIndicator::AroonOsc | SecondaryIndicator::AroonOscSimple => "aroonosc",
            SecondaryIndicator::Macd | SecondaryIndicator::MacdSimple => "macd",
            SecondaryIndicator::Chop | SecondaryIndicator::ChopSimple => "chop",
            SecondaryIndicator::Squeeze | SecondaryIndicator::SqueezeSimple => "squeeze",
            other => other.name(),
        }
    }
}

impl FromStr for SecondaryIndicator {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| ConfigError::UnknownIndicator(s.to_string()))
    }
}

impl fmt::Display for SecondaryIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Indicator names resolved by `EngineConfig::validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorSet {
    pub primary: PrimaryIndicator,
    /// Sorted, deduplicated.
    pub secondaries: Vec<SecondaryIndicator>,
}

impl IndicatorSet {
    pub fn has(&self, secondary: SecondaryIndicator) -> bool {
        self.secondaries.binary_search(&secondary).is_ok()
    }

    pub fn has_any(&self, any: &[SecondaryIndicator]) -> bool {
        any.iter().any(|s| self.has(*s))
    }
}

// ─── Sub-tables ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Allow short entries.
    pub shortable: bool,
    /// Only ever trade the short side.
    pub short_only: bool,
    /// Keep positions across sessions and skip the end-of-day gates.
    pub allow_overnight: bool,
    /// No new entries within this many minutes of the close.
    pub entry_cutoff_minutes: i64,
    /// Forced exit this many minutes before the close.
    pub forced_exit_minutes: i64,
    /// Length of the last-hour window in which a small gain exits.
    pub last_hour_minutes: i64,
    /// Gain in percent that exits during the last hour.
    pub last_hour_threshold: f64,
    /// No new entries for this many minutes after the open.
    pub opening_delay_minutes: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            shortable: true,
            short_only: false,
            allow_overnight: false,
            entry_cutoff_minutes: 75,
            forced_exit_minutes: 5,
            last_hour_minutes: 60,
            last_hour_threshold: 0.2,
            opening_delay_minutes: 0,
        }
    }
}

/// StochRSI / StochMFI primary and the higher-timeframe StochRSI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StochasticConfig {
    pub rsi_period: usize,
    pub source: PriceSource,
    pub k_period: usize,
    pub d_period: usize,
    pub slow_period: usize,
    pub mfi_period: usize,
    pub low_limit: f64,
    pub high_limit: f64,
    /// Minimum K - D gap (long) or D - K gap (short) to confirm.
    pub offset: f64,
    pub no_crossover: bool,
    pub crossover_only: bool,
    /// Long signals reset once K and D reach this level.
    pub cancel_long: f64,
    /// Short signals reset once K and D fall to this level.
    pub cancel_short: f64,
    /// Bars per higher-timeframe group.
    pub htf_factor: usize,
    pub htf_rsi_period: usize,
    pub htf_k_period: usize,
}

impl Default for StochasticConfig {
    fn default() -> Self {
        Self {
            rsi_period: 128,
            source: PriceSource::Hlc3,
            k_period: 128,
            d_period: 3,
            slow_period: 3,
            mfi_period: 14,
            low_limit: 20.0,
            high_limit: 80.0,
            offset: 8.0,
            no_crossover: false,
            crossover_only: false,
            cancel_long: 40.0,
            cancel_short: 60.0,
            htf_factor: 5,
            htf_rsi_period: 28,
            htf_k_period: 28,
        }
    }
}

/// Parameters of the single-series secondaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub atr_period: usize,

    pub rsi_period: usize,
    pub rsi_source: PriceSource,
    pub rsi_low_limit: f64,
    pub rsi_high_limit: f64,
    pub rsi_cancel_long: f64,
    pub rsi_cancel_short: f64,

    pub mfi_period: usize,
    pub mfi_low_limit: f64,
    pub mfi_high_limit: f64,
    pub mfi_cancel_long: f64,
    pub mfi_cancel_short: f64,

    pub adx_period: usize,
    pub di_period: usize,
    pub adx_threshold: f64,
    pub dmi_with_adx: bool,

    pub aroonosc_period: usize,
    pub aroonosc_alt_period: usize,
    /// Intraday NATR above which the alternate Aroon period is used.
    pub aroonosc_alt_natr: f64,
    pub aroonosc_threshold: f64,

    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub macd_offset: f64,

    pub vwap_band_stddev: f64,
    pub vpt_sma_period: usize,

    pub chop_period: usize,
    pub chop_low_limit: f64,
    pub chop_high_limit: f64,

    pub supertrend_atr_period: usize,
    pub supertrend_multiplier: f64,

    pub roc_period: usize,
    pub roc_source: PriceSource,
    /// ROC exit fires once momentum reverses past this percent.
    pub roc_threshold: f64,

    pub trend_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            atr_period: 14,
            rsi_period: 14,
            rsi_source: PriceSource::Close,
            rsi_low_limit: 25.0,
            rsi_high_limit: 75.0,
            rsi_cancel_long: 40.0,
            rsi_cancel_short: 60.0,
            mfi_period: 14,
            mfi_low_limit: 20.0,
            mfi_high_limit: 80.0,
            mfi_cancel_long: 40.0,
            mfi_cancel_short: 60.0,
            adx_period: 92,
            di_period: 48,
            adx_threshold: 25.0,
            dmi_with_adx: false,
            aroonosc_period: 24,
            aroonosc_alt_period: 48,
            aroonosc_alt_natr: 0.24,
            aroonosc_threshold: 60.0,
            macd_fast: 48,
            macd_slow: 104,
            macd_signal: 36,
            macd_offset: 0.006,
            vwap_band_stddev: 2.0,
            vpt_sma_period: 72,
            chop_period: 14,
            chop_low_limit: 38.2,
            chop_high_limit: 61.8,
            supertrend_atr_period: 128,
            supertrend_multiplier: 3.0,
            roc_period: 14,
            roc_source: PriceSource::Hlc3,
            roc_threshold: 0.15,
            trend_period: 5,
        }
    }
}

/// Bollinger-inside-Keltner squeeze.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqueezeConfig {
    pub bbands_period: usize,
    pub bbands_stddev: f64,
    pub kchannel_period: usize,
    pub kchannel_atr_period: usize,
    pub kchannel_multiplier: f64,
    pub source: PriceSource,
    /// Bars inside the channel before a squeeze counts.
    pub min_count: u32,
    /// Gap (percent of the channel midline) that arms the narrowing signal.
    pub offset: f64,
    pub crossover_only: bool,
    /// Trailing ROC values that must agree with the side.
    pub roc_count: usize,
    /// Bars after a breakout before the linger exit or straddle engages.
    pub xover_exit_count: u32,
    pub linger_exit: bool,
    pub straddle: bool,
}

impl Default for SqueezeConfig {
    fn default() -> Self {
        Self {
            bbands_period: 20,
            bbands_stddev: 2.0,
            kchannel_period: 20,
            kchannel_atr_period: 20,
            kchannel_multiplier: 1.5,
            source: PriceSource::Hlc3,
            min_count: 8,
            offset: 0.15,
            crossover_only: false,
            roc_count: 2,
            xover_exit_count: 10,
            linger_exit: false,
            straddle: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackedMaConfig {
    pub ma_type: MaType,
    pub periods: Vec<usize>,
    pub source: PriceSource,
    /// Long-period stack for the trend quick exit.
    pub quick_exit_ma_type: MaType,
    pub quick_exit_periods: Vec<usize>,
}

impl Default for StackedMaConfig {
    fn default() -> Self {
        Self {
            ma_type: MaType::Kama,
            periods: vec![5, 8, 13],
            source: PriceSource::Close,
            quick_exit_ma_type: MaType::Kama,
            quick_exit_periods: vec![34, 55, 89],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MesaConfig {
    pub sine_period: usize,
    pub source: PriceSource,
    /// Sine crossovers only count beyond +/-0.5.
    pub sine_strict: bool,
    /// MAMA/FAMA needs a fresh crossover rather than plain ordering.
    pub mama_require_crossover: bool,
}

impl Default for MesaConfig {
    fn default() -> Self {
        Self {
            sine_period: 25,
            source: PriceSource::Hl2,
            sine_strict: false,
            mama_require_crossover: false,
        }
    }
}

/// Series supplied by `MarketData` rather than computed from bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalConfig {
    pub breadth_oversold: f64,
    pub breadth_overbought: f64,
    /// Trailing relative-strength values that must be stacked.
    pub rs_stack_len: usize,
    pub min_rs: Option<f64>,
    pub pattern_min_rank: Option<u32>,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            breadth_oversold: 3.0,
            breadth_overbought: -1.0,
            rs_stack_len: 3,
            min_rs: None,
            pattern_min_rank: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResistanceConfig {
    pub enabled: bool,
    pub use_pdc: bool,
    pub use_vwap: bool,
    pub use_pivots: bool,
    pub use_value_area: bool,
    pub use_key_levels: bool,
    pub keylevel_strict: bool,
    pub min_key_level_touches: u32,
    pub hod_lod_check: bool,
    /// Hour (exchange-local) from which the HOD/LOD check applies.
    pub hod_lod_after_hour: u32,
    pub price_resistance_pct: f64,
    pub price_support_pct: f64,
    /// Tick size for the value-area profile.
    pub tick_size: f64,
}

impl Default for ResistanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            use_pdc: true,
            use_vwap: true,
            use_pivots: false,
            use_value_area: false,
            use_key_levels: true,
            keylevel_strict: false,
            min_key_level_touches: 1,
            hod_lod_check: false,
            hod_lod_after_hour: 13,
            price_resistance_pct: 1.0,
            price_support_pct: 1.0,
            tick_size: 0.01,
        }
    }
}

/// Which candle decides an armed exit-percent exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReversalCheck {
    /// Red candle for longs, green for shorts.
    #[default]
    Candle,
    HeikinAshi,
    Trend,
    /// Heikin-Ashi and TTM trend must both have turned.
    Combined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitConfig {
    pub incr_threshold: f64,
    pub decr_threshold: f64,
    pub stoploss: bool,
    pub exit_percent: Option<f64>,
    pub quick_exit: bool,
    pub quick_exit_percent: Option<f64>,
    pub strict_exit_percent: bool,
    pub variable_exit: bool,
    pub cost_basis_exit: Option<f64>,
    pub vwap_exit: bool,
    pub reversal: ReversalCheck,
    pub stochastic_exit: bool,
    pub mesa_sine_exit: bool,
    pub roc_exit: bool,
    /// Counter-trend entries (long-period stack opposing) use quick exit.
    pub trend_quick_exit: bool,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            incr_threshold: 1.0,
            decr_threshold: 1.5,
            stoploss: true,
            exit_percent: None,
            quick_exit: false,
            quick_exit_percent: None,
            strict_exit_percent: false,
            variable_exit: false,
            cost_basis_exit: None,
            vwap_exit: false,
            reversal: ReversalCheck::Candle,
            stochastic_exit: true,
            mesa_sine_exit: false,
            roc_exit: false,
            trend_quick_exit: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryGates {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_natr: Option<f64>,
    pub max_natr: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Dollars per entry; quantity is the whole number of shares it buys (at least 1).
    pub position_usd: f64,
    /// Timeout passed to every broker call.
    pub boundary_timeout_ms: u64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            position_usd: 1000.0,
            boundary_timeout_ms: 5000,
        }
    }
}

// ─── EngineConfig ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub symbol: String,
    pub primary: String,
    pub secondaries: Vec<String>,
    /// Evaluate entries on Heikin-Ashi candles.
    pub use_ha_candles: bool,
    pub session: SessionConfig,
    pub stochastic: StochasticConfig,
    pub indicators: IndicatorParams,
    pub squeeze: SqueezeConfig,
    pub stacked_ma: StackedMaConfig,
    pub mesa: MesaConfig,
    pub external: ExternalConfig,
    pub resistance: ResistanceConfig,
    pub exits: ExitConfig,
    pub gates: EntryGates,
    pub sizing: SizingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: String::new(),
            primary: PrimaryIndicator::StochRsi.name().to_string(),
            secondaries: Vec::new(),
            use_ha_candles: false,
            session: SessionConfig::default(),
            stochastic: StochasticConfig::default(),
            indicators: IndicatorParams::default(),
            squeeze: SqueezeConfig::default(),
            stacked_ma: StackedMaConfig::default(),
            mesa: MesaConfig::default(),
            external: ExternalConfig::default(),
            resistance: ResistanceConfig::default(),
            exits: ExitConfig::default(),
            gates: EntryGates::default(),
            sizing: SizingConfig::default(),
        }
    }
}

fn period(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid(field, "period must be >= 1"));
    }
    Ok(())
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value >= 0.0) {
        return Err(ConfigError::invalid(field, format!("{value} must be >= 0")));
    }
    Ok(())
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value > 0.0) {
        return Err(ConfigError::invalid(field, format!("{value} must be > 0")));
    }
    Ok(())
}

fn limits(field: &'static str, low: f64, high: f64) -> Result<(), ConfigError> {
    if !(0.0..=100.0).contains(&low) || !(0.0..=100.0).contains(&high) || low >= high {
        return Err(ConfigError::invalid(
            field,
            format!("limits {low}/{high} must satisfy 0 <= low < high <= 100"),
        ));
    }
    Ok(())
}

fn stack(field: &'static str, periods: &[usize]) -> Result<(), ConfigError> {
    if periods.len() < 2 {
        return Err(ConfigError::invalid(field, "need at least two periods"));
    }
    if periods.iter().any(|p| *p == 0) {
        return Err(ConfigError::invalid(field, "period must be >= 1"));
    }
    if periods.windows(2).any(|w| w[0] >= w[1]) {
        return Err(ConfigError::invalid(field, "periods must be strictly increasing"));
    }
    Ok(())
}

impl EngineConfig {
    /// Check every option and resolve indicator names.
    pub fn validate(&self) -> Result<IndicatorSet, ConfigError> {
        let primary: PrimaryIndicator = self.primary.parse()?;
        let mut secondaries = self
            .secondaries
            .iter()
            .map(|s| s.parse::<SecondaryIndicator>())
            .collect::<Result<Vec<_>, _>>()?;
        secondaries.sort();
        secondaries.dedup();

        for (i, a) in secondaries.iter().enumerate() {
            for b in &secondaries[i + 1..] {
                if a.family() == b.family() {
                    return Err(ConfigError::Conflict(a.name(), b.name()));
                }
            }
        }
        let overlap = match primary {
            PrimaryIndicator::StochMfi => Some(SecondaryIndicator::StochMfi),
            PrimaryIndicator::StackedMa => Some(SecondaryIndicator::StackedMa),
            PrimaryIndicator::MamaFama => Some(SecondaryIndicator::MamaFama),
            PrimaryIndicator::MesaSine => Some(SecondaryIndicator::MesaSine),
            _ => None,
        };
        if let Some(dup) = overlap {
            if secondaries.contains(&dup) {
                return Err(ConfigError::Conflict("primary", dup.name()));
            }
        }

        self.validate_session()?;
        self.validate_stochastic()?;
        self.validate_params()?;
        self.validate_exits()?;

        let sq = &self.squeeze;
        period("squeeze.bbands_period", sq.bbands_period)?;
        period("squeeze.kchannel_period", sq.kchannel_period)?;
        period("squeeze.kchannel_atr_period", sq.kchannel_atr_period)?;
        positive("squeeze.bbands_stddev", sq.bbands_stddev)?;
        positive("squeeze.kchannel_multiplier", sq.kchannel_multiplier)?;
        non_negative("squeeze.offset", sq.offset)?;
        if sq.straddle && !secondaries.contains(&SecondaryIndicator::Squeeze) {
            return Err(ConfigError::Requires("squeeze.straddle", "secondary `squeeze`"));
        }
        if sq.linger_exit
            && !secondaries
                .iter()
                .any(|s| matches!(s, SecondaryIndicator::Squeeze | SecondaryIndicator::SqueezeSimple))
        {
            return Err(ConfigError::Requires("squeeze.linger_exit", "secondary `squeeze`"));
        }

        stack("stacked_ma.periods", &self.stacked_ma.periods)?;
        stack("stacked_ma.quick_exit_periods", &self.stacked_ma.quick_exit_periods)?;
        period("mesa.sine_period", self.mesa.sine_period)?;
        if self.external.rs_stack_len < 2 {
            return Err(ConfigError::invalid("external.rs_stack_len", "must be >= 2"));
        }
        if self.external.breadth_overbought >= self.external.breadth_oversold {
            return Err(ConfigError::invalid(
                "external.breadth_overbought",
                "must be below breadth_oversold",
            ));
        }

        let r = &self.resistance;
        non_negative("resistance.price_resistance_pct", r.price_resistance_pct)?;
        non_negative("resistance.price_support_pct", r.price_support_pct)?;
        positive("resistance.tick_size", r.tick_size)?;
        if r.hod_lod_after_hour > 23 {
            return Err(ConfigError::invalid("resistance.hod_lod_after_hour", "must be 0..=23"));
        }

        let g = &self.gates;
        if let (Some(lo), Some(hi)) = (g.min_price, g.max_price) {
            if lo > hi {
                return Err(ConfigError::invalid("gates.min_price", "above max_price"));
            }
        }
        if let (Some(lo), Some(hi)) = (g.min_natr, g.max_natr) {
            if lo > hi {
                return Err(ConfigError::invalid("gates.min_natr", "above max_natr"));
            }
        }
        positive("sizing.position_usd", self.sizing.position_usd)?;

        Ok(IndicatorSet {
            primary,
            secondaries,
        })
    }

    fn validate_session(&self) -> Result<(), ConfigError> {
        let s = &self.session;
        if s.short_only && !s.shortable {
            return Err(ConfigError::Conflict("session.short_only", "session.shortable = false"));
        }
        for (field, minutes) in [
            ("session.entry_cutoff_minutes", s.entry_cutoff_minutes),
            ("session.forced_exit_minutes", s.forced_exit_minutes),
            ("session.last_hour_minutes", s.last_hour_minutes),
            ("session.opening_delay_minutes", s.opening_delay_minutes),
        ] {
            if minutes < 0 {
                return Err(ConfigError::invalid(field, "must be >= 0"));
            }
        }
        non_negative("session.last_hour_threshold", s.last_hour_threshold)
    }

    fn validate_stochastic(&self) -> Result<(), ConfigError> {
        let st = &self.stochastic;
        period("stochastic.rsi_period", st.rsi_period)?;
        period("stochastic.k_period", st.k_period)?;
        period("stochastic.d_period", st.d_period)?;
        period("stochastic.slow_period", st.slow_period)?;
        period("stochastic.mfi_period", st.mfi_period)?;
        period("stochastic.htf_factor", st.htf_factor)?;
        period("stochastic.htf_rsi_period", st.htf_rsi_period)?;
        period("stochastic.htf_k_period", st.htf_k_period)?;
        limits("stochastic.low_limit", st.low_limit, st.high_limit)?;
        for (field, level) in [
            ("stochastic.cancel_long", st.cancel_long),
            ("stochastic.cancel_short", st.cancel_short),
        ] {
            if !(0.0..=100.0).contains(&level) {
                return Err(ConfigError::invalid(field, format!("{level} outside 0..=100")));
            }
        }
        non_negative("stochastic.offset", st.offset)?;
        if st.no_crossover && st.crossover_only {
            return Err(ConfigError::Conflict("stochastic.no_crossover", "stochastic.crossover_only"));
        }
        Ok(())
    }

    fn validate_params(&self) -> Result<(), ConfigError> {
        let p = &self.indicators;
        for (field, value) in [
            ("indicators.atr_period", p.atr_period),
            ("indicators.rsi_period", p.rsi_period),
            ("indicators.mfi_period", p.mfi_period),
            ("indicators.adx_period", p.adx_period),
            ("indicators.di_period", p.di_period),
            ("indicators.aroonosc_period", p.aroonosc_period),
            ("indicators.aroonosc_alt_period", p.aroonosc_alt_period),
            ("indicators.macd_fast", p.macd_fast),
            ("indicators.macd_slow", p.macd_slow),
            ("indicators.macd_signal", p.macd_signal),
            ("indicators.vpt_sma_period", p.vpt_sma_period),
            ("indicators.supertrend_atr_period", p.supertrend_atr_period),
            ("indicators.roc_period", p.roc_period),
            ("indicators.trend_period", p.trend_period),
        ] {
            period(field, value)?;
        }
        if p.chop_period < 2 {
            return Err(ConfigError::invalid("indicators.chop_period", "must be >= 2"));
        }
        if p.macd_fast >= p.macd_slow {
            return Err(ConfigError::invalid("indicators.macd_fast", "must be below macd_slow"));
        }
        limits("indicators.rsi_low_limit", p.rsi_low_limit, p.rsi_high_limit)?;
        limits("indicators.mfi_low_limit", p.mfi_low_limit, p.mfi_high_limit)?;
        limits("indicators.chop_low_limit", p.chop_low_limit, p.chop_high_limit)?;
        non_negative("indicators.adx_threshold", p.adx_threshold)?;
        non_negative("indicators.aroonosc_threshold", p.aroonosc_threshold)?;
        non_negative("indicators.macd_offset", p.macd_offset)?;
        non_negative("indicators.roc_threshold", p.roc_threshold)?;
        positive("indicators.supertrend_multiplier", p.supertrend_multiplier)
    }

    fn validate_exits(&self) -> Result<(), ConfigError> {
        let e = &self.exits;
        positive("exits.incr_threshold", e.incr_threshold)?;
        positive("exits.decr_threshold", e.decr_threshold)?;
        for (field, value) in [
            ("exits.exit_percent", e.exit_percent),
            ("exits.quick_exit_percent", e.quick_exit_percent),
            ("exits.cost_basis_exit", e.cost_basis_exit),
        ] {
            if let Some(v) = value {
                positive(field, v)?;
            }
        }
        if e.exit_percent.is_none() {
            if e.quick_exit {
                return Err(ConfigError::Requires("exits.quick_exit", "exits.exit_percent"));
            }
            if e.quick_exit_percent.is_some() {
                return Err(ConfigError::Requires("exits.quick_exit_percent", "exits.exit_percent"));
            }
            if e.strict_exit_percent {
                return Err(ConfigError::Requires("exits.strict_exit_percent", "exits.exit_percent"));
            }
            if e.trend_quick_exit {
                return Err(ConfigError::Requires("exits.trend_quick_exit", "exits.exit_percent"));
            }
        }
        Ok(())
    }

    pub fn boundary_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.sizing.boundary_timeout_ms)
    }
}
