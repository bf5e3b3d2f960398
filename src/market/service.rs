//! Market config resolution.

use tracing::info;

use crate::common::error::ChurnResult;

use super::domain::{market_key, MarketConfig, MarketConfigProvider};

/// Resolve the config for `market`, or for `default` when unset.
///
/// A provider with nothing stored under the key yields an empty config.
pub fn load_market_config(
    provider: &dyn MarketConfigProvider,
    market: Option<&str>,
) -> ChurnResult<MarketConfig> {
    let key = market_key(market);
    let config = provider.fetch(key)?.unwrap_or_default();
    info!(
        market = key,
        features = config.features.as_ref().map_or(0, Vec::len),
        threshold = config.threshold(),
        custom_params = !config.model_params.is_empty(),
        "resolved market config"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::StaticMarketConfigProvider;

    #[test]
    fn absent_market_reads_default_key() {
        let provider = StaticMarketConfigProvider::new().with(
            "default",
            MarketConfig {
                threshold: Some(0.6),
                ..MarketConfig::default()
            },
        );
        assert_eq!(load_market_config(&provider, None).unwrap().threshold(), 0.6);
    }

    #[test]
    fn unknown_market_is_empty_config() {
        let provider = StaticMarketConfigProvider::new();
        let cfg = load_market_config(&provider, Some("ZZ")).unwrap();
        assert_eq!(cfg, MarketConfig::default());
        assert_eq!(cfg.threshold(), 0.5);
    }
}
