//! Holdout evaluation of trained models.

pub mod domain;
pub mod service;

pub use domain::Metrics;
pub use service::{accuracy, evaluate, roc_auc, HoldoutEval};
