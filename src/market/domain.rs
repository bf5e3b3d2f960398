//! Per-market configuration and the provider contract that resolves it.

use serde::{Deserialize, Serialize};

use crate::common::error::{ChurnError, ChurnResult};
use crate::training::domain::ModelParams;

/// Key used when no market is requested.
pub const DEFAULT_MARKET: &str = "default";
/// Probability cutoff used when a config does not set one.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Resolve the market key, treating an empty market as absent.
pub fn market_key(market: Option<&str>) -> &str {
    match market {
        Some(m) if !m.is_empty() => m,
        _ => DEFAULT_MARKET,
    }
}

/// Optional settings for one market. Every field may be absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    #[serde(default)]
    pub features: Option<Vec<String>>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub model_params: ModelParams,
}

impl MarketConfig {
    /// Parse the TOML form of a market config. `source_name` feeds error messages.
    pub fn from_toml(text: &str, source_name: &str) -> ChurnResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(text).map_err(|err| ChurnError::ConfigParse {
            source_name: source_name.to_string(),
            reason: err.to_string(),
        })?;
        config.validate(source_name)?;
        Ok(config)
    }

    /// Effective decision threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold.unwrap_or(DEFAULT_THRESHOLD)
    }

    pub fn validate(&self, source_name: &str) -> ChurnResult<()> {
        if let Some(t) = self.threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(ChurnError::ConfigParse {
                    source_name: source_name.to_string(),
                    reason: format!("threshold {t} is outside [0, 1]"),
                });
            }
        }
        Ok(())
    }
}

/// Source of market configurations.
pub trait MarketConfigProvider {
    /// Fetch the config stored under `key`, `None` when nothing is stored.
    fn fetch(&self, key: &str) -> ChurnResult<Option<MarketConfig>>;
}
