//! Runtime configuration loaded from the process environment.
//!
//! Only process-wide knobs live here. Per-market model settings are resolved
//! through [`crate::market::MarketConfigProvider`].

use std::env;
use std::path::PathBuf;

/// Environment variable naming the directory that holds `<market>.toml` files.
pub const MARKET_CONFIG_DIR_ENV: &str = "CHURNLINE_MARKET_CONFIG_DIR";
/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV: &str = "CHURNLINE_LOG";

const DEFAULT_MARKET_CONFIG_DIR: &str = "config/markets";
const DEFAULT_LOG_FILTER: &str = "warn";

/// Snapshot of configuration values consumed by the CLI.
#[derive(Clone, Debug)]
pub struct AppCfg {
    pub market_config_dir: PathBuf,
    pub log_filter: String,
}

impl AppCfg {
    /// Create a configuration snapshot from the process environment.
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a snapshot from an arbitrary key lookup.
    ///
    /// `RUST_LOG` is honoured when `CHURNLINE_LOG` is unset so the usual
    /// `tracing` workflow keeps working.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            market_config_dir: non_empty(MARKET_CONFIG_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MARKET_CONFIG_DIR)),
            log_filter: non_empty(LOG_ENV)
                .or_else(|| non_empty("RUST_LOG"))
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        }
    }

    /// Replace the market config directory, typically from a CLI flag.
    pub fn with_market_config_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.market_config_dir = dir;
        }
        self
    }
}

impl Default for AppCfg {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
