//! Market configuration: features allowlist, threshold and hyperparameters.

pub mod domain;
pub mod repo_fs;
pub mod service;

pub use domain::{market_key, MarketConfig, MarketConfigProvider, DEFAULT_MARKET};
pub use repo_fs::{FsMarketConfigProvider, StaticMarketConfigProvider};
pub use service::load_market_config;
