//! Market config providers: a directory of TOML files, and an in-memory map.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use tracing::debug;

use crate::common::config::AppCfg;
use crate::common::error::ChurnResult;

use super::domain::{MarketConfig, MarketConfigProvider};

/// Reads `<root>/<market>.toml`.
#[derive(Clone, Debug)]
pub struct FsMarketConfigProvider {
    root: PathBuf,
}

impl FsMarketConfigProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_cfg(cfg: &AppCfg) -> Self {
        Self::new(cfg.market_config_dir.clone())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.toml"))
    }
}

impl MarketConfigProvider for FsMarketConfigProvider {
    fn fetch(&self, key: &str) -> ChurnResult<Option<MarketConfig>> {
        let path = self.path_for(key);
        if !path.is_file() {
            debug!(path = %path.display(), "no market config file");
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        MarketConfig::from_toml(&text, &path.display().to_string()).map(Some)
    }
}

/// Fixed set of configs held in memory.
#[derive(Clone, Debug, Default)]
pub struct StaticMarketConfigProvider {
    configs: HashMap<String, MarketConfig>,
}

impl StaticMarketConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, config: MarketConfig) -> Self {
        self.configs.insert(key.into(), config);
        self
    }
}

impl MarketConfigProvider for StaticMarketConfigProvider {
    fn fetch(&self, key: &str) -> ChurnResult<Option<MarketConfig>> {
        Ok(self.configs.get(key).cloned())
    }
}
