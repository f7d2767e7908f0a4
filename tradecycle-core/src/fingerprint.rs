//! Run fingerprinting: deterministic identity of an engine configuration and
//! of the bar history it ran over.
//!
//! - `ConfigHash`: BLAKE3 of the canonical JSON of an `EngineConfig`.
//! - `DatasetHash`: BLAKE3 over the bar sequence.
//! - `RunFingerprint`: tags every exported result.

use crate::config::EngineConfig;
use crate::domain::Bar;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigHash(pub String);

impl ConfigHash {
    /// Hash of the config with keys sorted at every level, so field order
    /// in the struct or the source file never changes the result.
    pub fn of(config: &EngineConfig) -> Result<Self, serde_json::Error> {
        let canonical = serde_json::to_value(config)?;
        let json = serde_json::to_string(&canonical)?;
        Ok(Self(blake3::hash(json.as_bytes()).to_hex().to_string()))
    }

    /// First 12 hex characters, for logs and file names.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl DatasetHash {
    pub fn of(bars: &[Bar]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for bar in bars {
            hasher.update(&bar.timestamp.and_utc().timestamp().to_le_bytes());
            for v in [bar.open, bar.high, bar.low, bar.close] {
                hasher.update(&v.to_bits().to_le_bytes());
            }
            hasher.update(&bar.volume.to_le_bytes());
        }
        Self(hasher.finalize().to_hex().to_string())
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one instrument run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFingerprint {
    pub symbol: String,
    pub config_hash: ConfigHash,
    pub dataset_hash: DatasetHash,
    pub bar_count: usize,
    pub first_bar: Option<NaiveDateTime>,
    pub last_bar: Option<NaiveDateTime>,
}

impl RunFingerprint {
    pub fn new(config: &EngineConfig, bars: &[Bar]) -> Result<Self, serde_json::Error> {
        Ok(Self {
            symbol: config.symbol.clone(),
            config_hash: ConfigHash::of(config)?,
            dataset_hash: DatasetHash::of(bars),
            bar_count: bars.len(),
            first_bar: bars.first().map(|b| b.timestamp),
            last_bar: bars.last().map(|b| b.timestamp),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    #[test]
    fn config_hash_is_deterministic() {
        let cfg = EngineConfig::default();
        let h1 = ConfigHash::of(&cfg).unwrap();
        let h2 = ConfigHash::of(&cfg.clone()).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.0.len(), 64);
        assert_eq!(h1.short().len(), 12);
    }

    #[test]
    fn config_hash_changes_with_params() {
        let a = EngineConfig::default();
        let mut b = EngineConfig::default();
        b.exits.decr_threshold = 2.0;
        assert_ne!(ConfigHash::of(&a).unwrap(), ConfigHash::of(&b).unwrap());
    }

    #[test]
    fn dataset_hash_sees_every_bar() {
        let bars = make_bars(&[10.0, 11.0, 12.0]);
        let mut changed = bars.clone();
        changed[2].volume += 1;
        assert_ne!(DatasetHash::of(&bars), DatasetHash::of(&changed));
        assert_eq!(DatasetHash::of(&bars), DatasetHash::of(&bars.clone()));
    }

    #[test]
    fn fingerprint_records_range() {
        let bars = make_bars(&[10.0, 11.0, 12.0]);
        let cfg = EngineConfig {
            symbol: "SPY".into(),
            ..Default::default()
        };
        let fp = RunFingerprint::new(&cfg, &bars).unwrap();
        assert_eq!(fp.bar_count, 3);
        assert_eq!(fp.first_bar, Some(bars[0].timestamp));
        assert_eq!(fp.last_bar, Some(bars[2].timestamp));
    }
}
