//! Evaluation record produced by a training run.

use serde::{Deserialize, Serialize};

/// Holdout statistics for one trained model.
///
/// `auc` is `None` (serialised as `null`) when the holdout holds a single class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub market: String,
    pub n_rows_train: usize,
    pub n_rows_test: usize,
    pub n_features: usize,
    pub cat_cols: Vec<String>,
    pub num_cols: Vec<String>,
    pub target: String,
    pub test_positive_rate: f64,
    pub accuracy: f64,
    pub auc: Option<f64>,
}
