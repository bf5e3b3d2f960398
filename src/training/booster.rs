//! Gradient boosted decision trees for binary classification.
//!
//! Second-order boosting on log-loss in the XGBoost style:
//!
//! 1. Quantise each feature into cut points (`hist`) or use every distinct
//!    value (`exact`).
//! 2. Per round, compute gradients/hessians of the log-loss, subsample rows and
//!    columns, and grow one depth-wise tree from per-node histograms.
//! 3. Add the shrunk leaf weights to every training margin.
//!
//! Missing values (`NaN`) learn a default direction at each split. A row goes
//! left when `x < threshold`.

use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::common::error::{ChurnError, ChurnResult};

use super::domain::ModelParams;

const MISSING_BIN: u32 = u32::MAX;
const MIN_HESSIAN: f64 = 1e-16;
const MIN_SPLIT_GAIN: f64 = 1e-6;
const PROB_CLAMP: f64 = 1e-6;

/// Split candidate search strategy.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeMethod {
    /// Quantile cut points, at most `max_bin` bins per feature.
    Hist,
    /// Every distinct value is a candidate threshold.
    Exact,
}

/// Typed booster settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoosterParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub min_child_weight: f64,
    pub reg_lambda: f64,
    pub reg_alpha: f64,
    pub gamma: f64,
    pub tree_method: TreeMethod,
    pub max_bin: usize,
    pub random_state: u64,
    /// Recorded only; boosting runs on the calling thread.
    pub n_jobs: i64,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            subsample: 1.0,
            colsample_bytree: 1.0,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            tree_method: TreeMethod::Hist,
            max_bin: 256,
            random_state: 0,
            n_jobs: 0,
        }
    }
}

impl BoosterParams {
    /// Overlay a name → value mapping on top of the defaults.
    ///
    /// Common aliases (`eta`, `lambda`, `alpha`, `seed`, `min_split_loss`) are
    /// accepted. Unknown names are ignored with a warning.
    pub fn from_model_params(params: &ModelParams) -> ChurnResult<Self> {
        let mut out = Self::default();
        for (name, value) in params.iter() {
            let as_f64 = || {
                value.as_f64().ok_or_else(|| {
                    ChurnError::invalid_param(name, format!("expected a number, got {value:?}"))
                })
            };
            let as_count = || {
                value
                    .as_i64()
                    .filter(|v| *v >= 0)
                    .map(|v| v as usize)
                    .ok_or_else(|| {
                        ChurnError::invalid_param(
                            name,
                            format!("expected a non-negative integer, got {value:?}"),
                        )
                    })
            };

            match name {
                "n_estimators" => out.n_estimators = as_count()?,
                "learning_rate" | "eta" => out.learning_rate = as_f64()?,
                "max_depth" => out.max_depth = as_count()?,
                "subsample" => out.subsample = as_f64()?,
                "colsample_bytree" => out.colsample_bytree = as_f64()?,
                "min_child_weight" => out.min_child_weight = as_f64()?,
                "reg_lambda" | "lambda" => out.reg_lambda = as_f64()?,
                "reg_alpha" | "alpha" => out.reg_alpha = as_f64()?,
                "gamma" | "min_split_loss" => out.gamma = as_f64()?,
                "max_bin" => out.max_bin = as_count()?,
                "random_state" | "seed" => {
                    out.random_state = value
                        .as_i64()
                        .map(|v| v as u64)
                        .ok_or_else(|| ChurnError::invalid_param(name, "expected an integer seed"))?
                }
                "n_jobs" | "nthread" => {
                    out.n_jobs = value
                        .as_i64()
                        .ok_or_else(|| ChurnError::invalid_param(name, "expected an integer"))?
                }
                "tree_method" => {
                    out.tree_method = match value.as_str() {
                        Some("hist") | Some("approx") | Some("auto") => TreeMethod::Hist,
                        Some("exact") => TreeMethod::Exact,
                        other => {
                            return Err(ChurnError::invalid_param(
                                name,
                                format!("unsupported tree method {other:?}"),
                            ))
                        }
                    }
                }
                "objective" => match value.as_str() {
                    Some("binary:logistic") => {}
                    other => {
                        return Err(ChurnError::invalid_param(
                            name,
                            format!("only binary:logistic is supported, got {other:?}"),
                        ))
                    }
                },
                // Evaluation-set and verbosity knobs have no effect on the fit.
                "eval_metric" | "verbosity" | "use_label_encoder" => {}
                unknown => warn!(param = unknown, "ignoring unknown hyperparameter"),
            }
        }
        out.validate()?;
        Ok(out)
    }

    fn validate(&self) -> ChurnResult<()> {
        let unit = |name: &str, v: f64| {
            if v > 0.0 && v <= 1.0 {
                Ok(())
            } else {
                Err(ChurnError::invalid_param(name, format!("{v} is outside (0, 1]")))
            }
        };
        unit("subsample", self.subsample)?;
        unit("colsample_bytree", self.colsample_bytree)?;
        if self.learning_rate < 0.0 {
            return Err(ChurnError::invalid_param("learning_rate", "must be >= 0"));
        }
        if self.max_depth == 0 {
            return Err(ChurnError::invalid_param("max_depth", "must be >= 1"));
        }
        if self.max_bin < 2 {
            return Err(ChurnError::invalid_param("max_bin", "must be >= 2"));
        }
        let penalties = [self.reg_lambda, self.reg_alpha, self.gamma, self.min_child_weight];
        if penalties.iter().any(|&v| v < 0.0) {
            return Err(ChurnError::invalid_param(
                "regularisation",
                "reg_lambda, reg_alpha, gamma and min_child_weight must be >= 0",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        default_left: bool,
        left: usize,
        right: usize,
    },
}

/// One regression tree over the encoded feature space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut at = 0;
        loop {
            match self.nodes[at] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    default_left,
                    left,
                    right,
                } => {
                    let x = row[feature];
                    let go_left = if x.is_nan() { default_left } else { x < threshold };
                    at = if go_left { left } else { right };
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

/// Column-major bin indices plus the cut points that produced them.
struct BinnedMatrix {
    cuts: Vec<Vec<f64>>,
    bins: Vec<Vec<u32>>,
}

impl BinnedMatrix {
    fn build(x: ArrayView2<f64>, method: TreeMethod, max_bin: usize) -> Self {
        let mut cuts = Vec::with_capacity(x.ncols());
        let mut bins = Vec::with_capacity(x.ncols());
        for column in x.columns() {
            let feature_cuts = find_cuts(column, method, max_bin);
            let feature_bins = column
                .iter()
                .map(|&v| {
                    if v.is_nan() {
                        MISSING_BIN
                    } else {
                        feature_cuts.partition_point(|&c| c <= v) as u32
                    }
                })
                .collect();
            cuts.push(feature_cuts);
            bins.push(feature_bins);
        }
        Self { cuts, bins }
    }
}

/// Candidate thresholds for one feature, ascending and strictly above the
/// feature minimum so every split leaves at least one value on each side.
/// Only finite values become thresholds.
fn find_cuts(column: ArrayView1<f64>, method: TreeMethod, max_bin: usize) -> Vec<f64> {
    let mut sorted: Vec<f64> = column.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return Vec::new();
    }
    sorted.sort_by(f64::total_cmp);
    let min = sorted[0];

    let mut distinct = sorted.clone();
    distinct.dedup();
    let candidates: Vec<f64> = if method == TreeMethod::Exact || distinct.len() <= max_bin {
        distinct.into_iter().skip(1).collect()
    } else {
        let n = sorted.len();
        let mut picked: Vec<f64> = (1..max_bin)
            .map(|k| sorted[k * n / max_bin])
            .filter(|&c| c > min)
            .collect();
        picked.dedup();
        picked
    };
    candidates
}

#[derive(Copy, Clone, Debug)]
struct GradStats {
    grad: f64,
    hess: f64,
}

impl GradStats {
    const ZERO: Self = Self { grad: 0.0, hess: 0.0 };

    fn add(&mut self, grad: f64, hess: f64) {
        self.grad += grad;
        self.hess += hess;
    }

    fn plus(self, other: Self) -> Self {
        Self {
            grad: self.grad + other.grad,
            hess: self.hess + other.hess,
        }
    }

    fn minus(self, other: Self) -> Self {
        Self {
            grad: self.grad - other.grad,
            hess: self.hess - other.hess,
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct SplitCandidate {
    feature: usize,
    cut: usize,
    default_left: bool,
    gain: f64,
}

struct TreeBuilder<'a> {
    params: &'a BoosterParams,
    binned: &'a BinnedMatrix,
    grad: &'a [f64],
    hess: &'a [f64],
    features: &'a [usize],
    nodes: Vec<Node>,
}

impl TreeBuilder<'_> {
    fn soft_threshold(&self, g: f64) -> f64 {
        let alpha = self.params.reg_alpha;
        if g > alpha {
            g - alpha
        } else if g < -alpha {
            g + alpha
        } else {
            0.0
        }
    }

    fn score(&self, stats: GradStats) -> f64 {
        let g = self.soft_threshold(stats.grad);
        g * g / (stats.hess + self.params.reg_lambda)
    }

    fn leaf_weight(&self, stats: GradStats) -> f64 {
        let denom = stats.hess + self.params.reg_lambda;
        if denom <= 0.0 {
            return 0.0;
        }
        -self.soft_threshold(stats.grad) / denom * self.params.learning_rate
    }

    fn totals(&self, rows: &[usize]) -> GradStats {
        let mut stats = GradStats::ZERO;
        for &r in rows {
            stats.add(self.grad[r], self.hess[r]);
        }
        stats
    }

    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let totals = self.totals(&rows);
        let at = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: self.leaf_weight(totals),
        });

        if depth >= self.params.max_depth || rows.len() < 2 {
            return at;
        }
        let Some(best) = self.best_split(&rows, totals) else {
            return at;
        };

        let bins = &self.binned.bins[best.feature];
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows.iter().copied().partition(|&r| {
            let bin = bins[r];
            if bin == MISSING_BIN {
                best.default_left
            } else {
                bin as usize <= best.cut
            }
        });

        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[at] = Node::Split {
            feature: best.feature,
            threshold: self.binned.cuts[best.feature][best.cut],
            default_left: best.default_left,
            left,
            right,
        };
        at
    }

    fn best_split(&self, rows: &[usize], totals: GradStats) -> Option<SplitCandidate> {
        let parent = self.score(totals);
        let min_child = self.params.min_child_weight;
        let mut best: Option<SplitCandidate> = None;

        for &feature in self.features {
            let cuts = &self.binned.cuts[feature];
            if cuts.is_empty() {
                continue;
            }
            let bins = &self.binned.bins[feature];
            let mut histogram = vec![GradStats::ZERO; cuts.len() + 1];
            let mut missing = GradStats::ZERO;
            for &r in rows {
                match bins[r] {
                    MISSING_BIN => missing.add(self.grad[r], self.hess[r]),
                    bin => histogram[bin as usize].add(self.grad[r], self.hess[r]),
                }
            }

            let mut left_present = GradStats::ZERO;
            for (cut, bucket) in histogram.iter().take(cuts.len()).enumerate() {
                left_present = left_present.plus(*bucket);
                for default_left in [true, false] {
                    let left = if default_left {
                        left_present.plus(missing)
                    } else {
                        left_present
                    };
                    let right = totals.minus(left);
                    if left.hess < min_child || right.hess < min_child {
                        continue;
                    }
                    let gain =
                        0.5 * (self.score(left) + self.score(right) - parent) - self.params.gamma;
                    if gain > MIN_SPLIT_GAIN && best.map_or(true, |b| gain > b.gain) {
                        best = Some(SplitCandidate {
                            feature,
                            cut,
                            default_left,
                            gain,
                        });
                    }
                }
            }
        }
        best
    }
}

fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

/// Binary classifier producing `P(y = 1)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoostedClassifier {
    params: BoosterParams,
    base_margin: f64,
    n_features: Option<usize>,
    trees: Vec<Tree>,
}

impl BoostedClassifier {
    pub fn new(params: BoosterParams) -> Self {
        Self {
            params,
            base_margin: 0.0,
            n_features: None,
            trees: Vec::new(),
        }
    }

    pub fn params(&self) -> &BoosterParams {
        &self.params
    }

    pub fn is_fitted(&self) -> bool {
        self.n_features.is_some()
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Fit on an encoded matrix and 0/1 labels, replacing any previous fit.
    pub fn fit(&mut self, x: ArrayView2<f64>, y: &[u8]) -> ChurnResult<()> {
        let n_rows = x.nrows();
        if n_rows == 0 || n_rows != y.len() {
            return Err(ChurnError::SchemaMismatch(format!(
                "cannot fit on {n_rows} rows with {} labels",
                y.len()
            )));
        }

        let params = &self.params;
        let labels: Vec<f64> = y.iter().map(|&v| f64::from(v)).collect();
        let positive_rate = labels.iter().sum::<f64>() / n_rows as f64;
        let p0 = positive_rate.clamp(PROB_CLAMP, 1.0 - PROB_CLAMP);
        let base_margin = (p0 / (1.0 - p0)).ln();

        let binned = BinnedMatrix::build(x, params.tree_method, params.max_bin);
        let n_features = x.ncols();
        let n_sampled_features = if n_features == 0 {
            0
        } else {
            ((n_features as f64 * params.colsample_bytree).round() as usize).clamp(1, n_features)
        };

        let mut rng = StdRng::seed_from_u64(params.random_state);
        let mut margins = vec![base_margin; n_rows];
        let mut grad = vec![0.0; n_rows];
        let mut hess = vec![0.0; n_rows];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for round in 0..params.n_estimators {
            for i in 0..n_rows {
                let p = sigmoid(margins[i]);
                grad[i] = p - labels[i];
                hess[i] = (p * (1.0 - p)).max(MIN_HESSIAN);
            }

            let rows = sample_rows(&mut rng, n_rows, params.subsample);
            let mut features = index::sample(&mut rng, n_features, n_sampled_features).into_vec();
            features.sort_unstable();

            let mut builder = TreeBuilder {
                params,
                binned: &binned,
                grad: &grad,
                hess: &hess,
                features: &features,
                nodes: Vec::new(),
            };
            builder.grow(rows, 0);
            let tree = Tree {
                nodes: builder.nodes,
            };

            for (i, row) in x.rows().into_iter().enumerate() {
                margins[i] += tree.predict_row(row);
            }
            if round % 100 == 0 {
                debug!(round, leaves = tree.n_leaves(), "boosting round");
            }
            trees.push(tree);
        }

        self.base_margin = base_margin;
        self.n_features = Some(n_features);
        self.trees = trees;
        Ok(())
    }

    /// Positive-class probability for each row.
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> ChurnResult<Vec<f64>> {
        let expected = self
            .n_features
            .ok_or_else(|| ChurnError::SchemaMismatch("classifier has not been fitted".into()))?;
        if x.ncols() != expected {
            return Err(ChurnError::SchemaMismatch(format!(
                "expected {expected} encoded features, got {}",
                x.ncols()
            )));
        }
        Ok(x
            .rows()
            .into_iter()
            .map(|row| {
                let margin = self
                    .trees
                    .iter()
                    .fold(self.base_margin, |acc, tree| acc + tree.predict_row(row));
                sigmoid(margin)
            })
            .collect())
    }
}

/// Bernoulli row sample, never empty.
fn sample_rows(rng: &mut StdRng, n_rows: usize, subsample: f64) -> Vec<usize> {
    if subsample >= 1.0 {
        return (0..n_rows).collect();
    }
    let rows: Vec<usize> = (0..n_rows).filter(|_| rng.random::<f64>() < subsample).collect();
    if rows.is_empty() {
        vec![rng.random_range(0..n_rows)]
    } else {
        rows
    }
}
