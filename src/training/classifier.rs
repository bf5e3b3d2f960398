//! Classifier engines behind one fit / predict seam.
//!
//! Builds with the `xgboost` cargo feature train through libxgboost via
//! `xgboost_rust`. Other builds fall back to the in-crate [`BoostedClassifier`].
//! The engine is recorded in the artefact, so a model always scores with the
//! engine that fitted it.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::common::error::{ChurnError, ChurnResult};

use super::booster::{BoostedClassifier, BoosterParams};
use super::domain::{ModelParams, ParamValue};

/// libxgboost's default boosting round count.
const XGB_DEFAULT_ROUNDS: u32 = 100;

/// Which implementation fits the trees.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Xgboost,
    Builtin,
}

impl Default for Engine {
    fn default() -> Self {
        if cfg!(feature = "xgboost") {
            Engine::Xgboost
        } else {
            Engine::Builtin
        }
    }
}

/// Fitted or unfitted classifier of either engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "engine", rename_all = "lowercase")]
pub enum Classifier {
    Xgboost(XgbClassifier),
    Builtin(BoostedClassifier),
}

impl Classifier {
    pub fn new(engine: Engine, params: &ModelParams) -> ChurnResult<Self> {
        Ok(match engine {
            Engine::Xgboost => Classifier::Xgboost(XgbClassifier::from_model_params(params)?),
            Engine::Builtin => Classifier::Builtin(BoostedClassifier::new(
                BoosterParams::from_model_params(params)?,
            )),
        })
    }

    pub fn engine(&self) -> Engine {
        match self {
            Classifier::Xgboost(_) => Engine::Xgboost,
            Classifier::Builtin(_) => Engine::Builtin,
        }
    }

    /// Boosting rounds the fit will run.
    pub fn n_rounds(&self) -> usize {
        match self {
            Classifier::Xgboost(clf) => clf.n_rounds as usize,
            Classifier::Builtin(clf) => clf.params().n_estimators,
        }
    }

    pub fn is_fitted(&self) -> bool {
        match self {
            Classifier::Xgboost(clf) => clf.model.is_some(),
            Classifier::Builtin(clf) => clf.is_fitted(),
        }
    }

    pub fn fit(&mut self, x: ArrayView2<f64>, y: &[u8]) -> ChurnResult<()> {
        match self {
            Classifier::Xgboost(clf) => clf.fit(x, y),
            Classifier::Builtin(clf) => clf.fit(x, y),
        }
    }

    /// Positive-class probability for each row.
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> ChurnResult<Vec<f64>> {
        match self {
            Classifier::Xgboost(clf) => clf.predict_proba(x),
            Classifier::Builtin(clf) => clf.predict_proba(x),
        }
    }
}

/// libxgboost booster with its learner settings.
///
/// The fitted booster is kept as libxgboost's own JSON model document so the
/// artefact stays a single self-contained file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct XgbClassifier {
    settings: Vec<(String, String)>,
    n_rounds: u32,
    n_features: Option<usize>,
    model: Option<String>,
}

impl XgbClassifier {
    /// Translate configured hyperparameters into libxgboost learner settings.
    ///
    /// `n_estimators` becomes the round count. scikit-learn style names are
    /// renamed to their native spelling; everything else passes through and is
    /// validated by libxgboost at fit time.
    pub fn from_model_params(params: &ModelParams) -> ChurnResult<Self> {
        let mut settings = vec![("objective".to_string(), "binary:logistic".to_string())];
        let mut n_rounds = XGB_DEFAULT_ROUNDS;
        for (name, value) in params.iter() {
            let native = match name {
                "n_estimators" => {
                    n_rounds = value
                        .as_i64()
                        .and_then(|v| u32::try_from(v).ok())
                        .ok_or_else(|| {
                            ChurnError::invalid_param(
                                name,
                                format!("expected a non-negative integer, got {value:?}"),
                            )
                        })?;
                    continue;
                }
                "objective" => match value.as_str() {
                    Some("binary:logistic") => continue,
                    other => {
                        return Err(ChurnError::invalid_param(
                            name,
                            format!("only binary:logistic is supported, got {other:?}"),
                        ))
                    }
                },
                "use_label_encoder" => {
                    warn!(param = name, "ignoring scikit-learn only hyperparameter");
                    continue;
                }
                "random_state" => "seed",
                "n_jobs" => "nthread",
                "reg_lambda" => "lambda",
                "reg_alpha" => "alpha",
                other => other,
            };
            settings.push((native.to_string(), render(value)));
        }
        debug!(rounds = n_rounds, settings = settings.len(), "xgboost settings");
        Ok(Self {
            settings,
            n_rounds,
            n_features: None,
            model: None,
        })
    }

    pub fn settings(&self) -> &[(String, String)] {
        &self.settings
    }

    pub fn fit(&mut self, x: ArrayView2<f64>, y: &[u8]) -> ChurnResult<()> {
        if x.nrows() == 0 || x.nrows() != y.len() {
            return Err(ChurnError::SchemaMismatch(format!(
                "cannot fit on {} rows with {} labels",
                x.nrows(),
                y.len()
            )));
        }
        self.model = Some(native::train(&self.settings, self.n_rounds, x, y)?);
        self.n_features = Some(x.ncols());
        Ok(())
    }

    pub fn predict_proba(&self, x: ArrayView2<f64>) -> ChurnResult<Vec<f64>> {
        let (Some(model), Some(expected)) = (&self.model, self.n_features) else {
            return Err(ChurnError::SchemaMismatch("classifier has not been fitted".into()));
        };
        if x.ncols() != expected {
            return Err(ChurnError::SchemaMismatch(format!(
                "expected {expected} encoded features, got {}",
                x.ncols()
            )));
        }
        native::predict(model, x)
    }
}

fn render(value: &ParamValue) -> String {
    match value {
        ParamValue::Bool(v) => v.to_string(),
        ParamValue::Int(v) => v.to_string(),
        ParamValue::Float(v) => v.to_string(),
        ParamValue::Text(v) => v.clone(),
    }
}

#[cfg(feature = "xgboost")]
mod native {
    use std::fs;
    use std::path::Path;

    use ndarray::ArrayView2;
    use tracing::info;
    use xgboost_rust as xgb;

    use crate::common::error::{ChurnError, ChurnResult};

    /// libxgboost picks the JSON model format from this extension.
    const MODEL_FILE: &str = "booster.json";

    fn engine_err(err: impl std::fmt::Display) -> ChurnError {
        ChurnError::Engine(err.to_string())
    }

    fn path_str(path: &Path) -> ChurnResult<&str> {
        path.to_str()
            .ok_or_else(|| ChurnError::Engine(format!("non UTF-8 path {}", path.display())))
    }

    fn dmatrix(x: ArrayView2<f64>) -> ChurnResult<xgb::DMatrix> {
        let rows: Vec<Vec<f64>> = x.rows().into_iter().map(|row| row.to_vec()).collect();
        xgb::DMatrix::from_dense(&rows, x.nrows()).map_err(engine_err)
    }

    pub(super) fn train(
        settings: &[(String, String)],
        n_rounds: u32,
        x: ArrayView2<f64>,
        y: &[u8],
    ) -> ChurnResult<String> {
        let mut dtrain = dmatrix(x)?;
        let labels: Vec<f32> = y.iter().map(|&v| f32::from(v)).collect();
        dtrain.set_labels(&labels).map_err(engine_err)?;

        let params: Vec<(&str, &str)> = settings
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        info!(rounds = n_rounds, "training xgboost booster");
        let booster = xgb::Booster::train(&dtrain, &params, n_rounds, &[]).map_err(engine_err)?;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join(MODEL_FILE);
        booster.save(path_str(&path)?).map_err(engine_err)?;
        Ok(fs::read_to_string(&path)?)
    }

    pub(super) fn predict(model: &str, x: ArrayView2<f64>) -> ChurnResult<Vec<f64>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(MODEL_FILE);
        fs::write(&path, model)?;
        let booster = xgb::Booster::load(path_str(&path)?).map_err(engine_err)?;
        let preds = booster.predict(&dmatrix(x)?).map_err(engine_err)?;
        Ok(preds.into_iter().map(f64::from).collect())
    }
}

#[cfg(not(feature = "xgboost"))]
mod native {
    use ndarray::ArrayView2;

    use crate::common::error::{ChurnError, ChurnResult};

    fn not_enabled() -> ChurnError {
        ChurnError::Engine("xgboost engine is not enabled; rebuild with --features xgboost".into())
    }

    pub(super) fn train(
        _settings: &[(String, String)],
        _n_rounds: u32,
        _x: ArrayView2<f64>,
        _y: &[u8],
    ) -> ChurnResult<String> {
        Err(not_enabled())
    }

    pub(super) fn predict(_model: &str, _x: ArrayView2<f64>) -> ChurnResult<Vec<f64>> {
        Err(not_enabled())
    }
}
