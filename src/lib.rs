//! Per-market customer churn models.
//!
//! `train` filters a CSV to one market, fits a one-hot + gradient-boosted
//! pipeline, evaluates it on a seeded holdout and writes the artefacts.
//! `predict` scores new rows with a stored model after checking it was trained
//! for the same market.

pub mod api;
pub mod common;
pub mod data;
pub mod evaluation;
pub mod inference;
pub mod market;
pub mod training;
