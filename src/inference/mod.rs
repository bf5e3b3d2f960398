//! Inference domain: scoring new data with a stored market model.

pub mod domain;
pub mod service;

pub use domain::{check_market_model_match, ScoreReport, ScoreRequest};
pub use service::predict;
