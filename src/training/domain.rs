//! Domain types for model training and artefact persistence.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::error::ChurnResult;
use crate::common::ids::schema_fingerprint;
use crate::common::time;
use crate::data::{ColumnRoles, RowId};
use crate::evaluation::Metrics;

use super::pipeline::Pipeline;

/// Scalar hyperparameter value as written in config files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

/// Hyperparameter name → value mapping handed to the classifier.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelParams(BTreeMap<String, ParamValue>);

impl ModelParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings used when a market config carries no `model_params`.
    pub fn defaults() -> Self {
        Self::new()
            .with("n_estimators", 500)
            .with("learning_rate", 0.1)
            .with("subsample", 0.8)
            .with("colsample_bytree", 0.8)
            .with("max_depth", 6)
            .with("tree_method", "hist")
            .with("eval_metric", "logloss")
            .with("random_state", 1)
            .with("n_jobs", 0)
    }

    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Everything needed to run a training job.
#[derive(Clone, Debug)]
pub struct TrainRequest {
    pub data: PathBuf,
    pub market: Option<String>,
    pub market_col: String,
    pub target: String,
    pub outdir: PathBuf,
}

/// Metadata stored next to the fitted pipeline.
///
/// Scoring checks the market recorded here rather than trusting the file name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub market: String,
    pub target: String,
    pub cat_cols: Vec<String>,
    pub num_cols: Vec<String>,
    pub schema_fingerprint: String,
    pub params: ModelParams,
    pub threshold: f64,
    pub trained_at: String,
    pub crate_version: String,
}

impl ModelManifest {
    pub fn new(
        market: &str,
        target: &str,
        roles: &ColumnRoles,
        params: ModelParams,
        threshold: f64,
    ) -> Self {
        Self {
            market: market.to_string(),
            target: target.to_string(),
            cat_cols: roles.categorical.clone(),
            num_cols: roles.numerical.clone(),
            schema_fingerprint: schema_fingerprint(&roles.categorical, &roles.numerical),
            params,
            threshold,
            trained_at: time::now_rfc3339(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Feature columns the pipeline reads, categorical first.
    pub fn feature_columns(&self) -> impl Iterator<Item = &str> {
        self.cat_cols.iter().chain(self.num_cols.iter()).map(String::as_str)
    }
}

/// Persisted model: manifest plus fitted pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub manifest: ModelManifest,
    pub pipeline: Pipeline,
}

/// Result of a training run as reported to the caller.
#[derive(Clone, Debug, Serialize)]
pub struct TrainReport {
    #[serde(flatten)]
    pub metrics: Metrics,
    pub model_path: String,
}

/// Repository contract for training outputs.
pub trait ModelRepo {
    /// Store the artefact and return where it went.
    fn put_model(&self, artifact: &ModelArtifact) -> ChurnResult<PathBuf>;
    fn get_model(&self, path: &Path) -> ChurnResult<ModelArtifact>;
    fn put_metrics(&self, market: &str, metrics: &Metrics) -> ChurnResult<PathBuf>;
    fn put_params(&self, market: &str, params: &ModelParams) -> ChurnResult<PathBuf>;
    fn put_holdout_scores(
        &self,
        market: &str,
        index: &[RowId],
        scores: &[f64],
    ) -> ChurnResult<PathBuf>;
}
