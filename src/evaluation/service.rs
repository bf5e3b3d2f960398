//! Metric calculators for binary classification.

use std::cmp::Ordering;

use crate::data::ColumnRoles;

use super::domain::Metrics;

/// Hard 0/1 predictions at a probability cutoff (`p >= threshold` is positive).
pub fn apply_threshold(proba: &[f64], threshold: f64) -> Vec<u8> {
    proba.iter().map(|&p| u8::from(p >= threshold)).collect()
}

/// Share of matching labels. Zero for empty input.
pub fn accuracy(y_true: &[u8], y_pred: &[u8]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// Mean of a 0/1 vector.
pub fn positive_rate(y: &[u8]) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    y.iter().map(|&v| f64::from(v)).sum::<f64>() / y.len() as f64
}

/// Area under the ROC curve via the rank-sum statistic, ties averaged.
///
/// Returns `None` unless both classes are present.
pub fn roc_auc(y_true: &[u8], scores: &[f64]) -> Option<f64> {
    let n_pos = y_true.iter().filter(|&&v| v == 1).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 || scores.len() != y_true.len() {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(Ordering::Equal));

    let mut rank_sum_pos = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // Ranks are 1-based; tied block shares the mean rank.
        let mean_rank = (start + 1 + end) as f64 / 2.0;
        let positives = order[start..end].iter().filter(|&&i| y_true[i] == 1).count();
        rank_sum_pos += mean_rank * positives as f64;
        start = end;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// Inputs for a holdout evaluation.
pub struct HoldoutEval<'a> {
    pub market: &'a str,
    pub target: &'a str,
    pub roles: &'a ColumnRoles,
    pub n_rows_train: usize,
    pub y_test: &'a [u8],
    pub proba: &'a [f64],
    pub threshold: f64,
}

/// Build the metrics record for a holdout partition.
pub fn evaluate(input: HoldoutEval<'_>) -> Metrics {
    let preds = apply_threshold(input.proba, input.threshold);
    Metrics {
        market: input.market.to_string(),
        n_rows_train: input.n_rows_train,
        n_rows_test: input.y_test.len(),
        n_features: input.roles.categorical.len() + input.roles.numerical.len(),
        cat_cols: input.roles.categorical.clone(),
        num_cols: input.roles.numerical.clone(),
        target: input.target.to_string(),
        test_positive_rate: positive_rate(input.y_test),
        accuracy: accuracy(input.y_test, &preds),
        auc: roc_auc(input.y_test, input.proba),
    }
}
