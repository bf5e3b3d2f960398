//! Preprocessing plus classifier, fitted and applied as one unit.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::common::error::{ChurnError, ChurnResult};
use crate::data::Dataset;

use super::classifier::{Classifier, Engine};
use super::domain::ModelParams;

/// Sorted category list for one categorical column. `None` is the missing
/// category and always sorts last.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OneHotColumn {
    pub name: String,
    pub categories: Vec<Option<String>>,
}

impl OneHotColumn {
    fn position(&self, value: &Option<String>) -> Option<usize> {
        self.categories.iter().position(|c| c == value)
    }
}

/// One-hot encodes categorical columns and passes numerical columns through.
///
/// Columns listed in neither group are dropped. Unseen categories encode as an
/// all-zero block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    categorical: Vec<String>,
    numerical: Vec<String>,
    encoders: Option<Vec<OneHotColumn>>,
}

impl Preprocessor {
    pub fn new(categorical: &[String], numerical: &[String]) -> Self {
        Self {
            categorical: categorical.to_vec(),
            numerical: numerical.to_vec(),
            encoders: None,
        }
    }

    pub fn categorical(&self) -> &[String] {
        &self.categorical
    }

    pub fn numerical(&self) -> &[String] {
        &self.numerical
    }

    pub fn encoders(&self) -> Option<&[OneHotColumn]> {
        self.encoders.as_deref()
    }

    /// Learn the category vocabulary of every categorical column.
    pub fn fit(&mut self, x: &Dataset) -> ChurnResult<()> {
        let mut encoders = Vec::with_capacity(self.categorical.len());
        for name in &self.categorical {
            let column = x.require(name)?;
            let mut present: Vec<String> =
                (0..x.n_rows()).filter_map(|r| column.data.text(r)).collect();
            present.sort();
            present.dedup();
            let has_missing = (0..x.n_rows()).any(|r| column.data.text(r).is_none());

            let mut categories: Vec<Option<String>> = present.into_iter().map(Some).collect();
            if has_missing {
                categories.push(None);
            }
            encoders.push(OneHotColumn {
                name: name.clone(),
                categories,
            });
        }
        for name in &self.numerical {
            x.require(name)?;
        }
        self.encoders = Some(encoders);
        Ok(())
    }

    /// Width of the encoded matrix.
    pub fn n_outputs(&self) -> usize {
        let one_hot: usize = self
            .encoders
            .iter()
            .flatten()
            .map(|e| e.categories.len())
            .sum();
        one_hot + self.numerical.len()
    }

    /// Encode `x` into a dense matrix: one-hot blocks first, then numerics.
    pub fn transform(&self, x: &Dataset) -> ChurnResult<Array2<f64>> {
        let encoders = self
            .encoders
            .as_ref()
            .ok_or_else(|| ChurnError::SchemaMismatch("preprocessor has not been fitted".into()))?;

        let mut out = Array2::<f64>::zeros((x.n_rows(), self.n_outputs()));
        let mut offset = 0;
        for encoder in encoders {
            let column = x.require(&encoder.name)?;
            for row in 0..x.n_rows() {
                if let Some(slot) = encoder.position(&column.data.text(row)) {
                    out[[row, offset + slot]] = 1.0;
                }
            }
            offset += encoder.categories.len();
        }

        for name in &self.numerical {
            let column = x.require(name)?;
            for row in 0..x.n_rows() {
                let value = column.data.numeric(row).ok_or_else(|| {
                    ChurnError::SchemaMismatch(format!(
                        "column '{name}' holds non-numeric value '{}'",
                        column.data.repr(row)
                    ))
                })?;
                // NaN is a missing value; infinities are not.
                if value.is_infinite() {
                    return Err(ChurnError::SchemaMismatch(format!(
                        "column '{name}' holds non-finite value '{}'",
                        column.data.repr(row)
                    )));
                }
                out[[row, offset]] = value;
            }
            offset += 1;
        }
        Ok(out)
    }
}

/// Composed preprocessing and boosted classifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pre: Preprocessor,
    clf: Classifier,
}

impl Pipeline {
    pub fn new(pre: Preprocessor, clf: Classifier) -> Self {
        Self { pre, clf }
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.pre
    }

    pub fn classifier(&self) -> &Classifier {
        &self.clf
    }

    pub fn is_fitted(&self) -> bool {
        self.pre.encoders.is_some() && self.clf.is_fitted()
    }

    pub fn fit(&mut self, x: &Dataset, y: &[u8]) -> ChurnResult<()> {
        self.pre.fit(x)?;
        let encoded = self.pre.transform(x)?;
        info!(
            rows = encoded.nrows(),
            encoded_features = encoded.ncols(),
            engine = ?self.clf.engine(),
            trees = self.clf.n_rounds(),
            "fitting classifier"
        );
        self.clf.fit(encoded.view(), y)
    }

    /// Probability of the positive class for every row of `x`.
    pub fn predict_proba(&self, x: &Dataset) -> ChurnResult<Vec<f64>> {
        let encoded = self.pre.transform(x)?;
        self.clf.predict_proba(encoded.view())
    }
}

/// Assemble an unfitted pipeline on the engine this build defaults to.
pub fn build_pipeline(
    cat_cols: &[String],
    num_cols: &[String],
    model_params: ModelParams,
) -> ChurnResult<(Pipeline, ModelParams)> {
    build_pipeline_with(Engine::default(), cat_cols, num_cols, model_params)
}

/// Assemble an unfitted pipeline and report the hyperparameters in effect.
///
/// An empty `model_params` is replaced by [`ModelParams::defaults`].
pub fn build_pipeline_with(
    engine: Engine,
    cat_cols: &[String],
    num_cols: &[String],
    model_params: ModelParams,
) -> ChurnResult<(Pipeline, ModelParams)> {
    let model_params = if model_params.is_empty() {
        debug!("no model_params configured, using defaults");
        ModelParams::defaults()
    } else {
        model_params
    };
    let clf = Classifier::new(engine, &model_params)?;
    let pipeline = Pipeline::new(Preprocessor::new(cat_cols, num_cols), clf);
    Ok((pipeline, model_params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Column, ColumnData};
    use crate::training::booster::TreeMethod;

    fn builtin_params(pipeline: &Pipeline) -> &crate::training::BoosterParams {
        match pipeline.classifier() {
            Classifier::Builtin(clf) => clf.params(),
            Classifier::Xgboost(_) => panic!("expected the builtin engine"),
        }
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn frame(plans: &[Option<&str>], tenure: &[f64]) -> Dataset {
        Dataset::with_range_index(vec![
            Column::new(
                "plan",
                ColumnData::Text(plans.iter().map(|p| p.map(str::to_string)).collect()),
            ),
            Column::new("tenure", ColumnData::Float(tenure.iter().copied().map(Some).collect())),
            Column::new("ignored", ColumnData::Int(vec![Some(0); tenure.len()])),
        ])
        .unwrap()
    }

    #[test]
    fn empty_params_fall_back_to_defaults() {
        let (pipeline, params) = build_pipeline_with(
            Engine::Builtin,
            &names(&["plan"]),
            &names(&["tenure"]),
            ModelParams::new(),
        )
        .unwrap();
        assert_eq!(params, ModelParams::defaults());
        assert_eq!(pipeline.classifier().n_rounds(), 500);
        assert_eq!(builtin_params(&pipeline).tree_method, TreeMethod::Hist);
        assert!(!pipeline.is_fitted());
    }

    #[test]
    fn configured_params_are_returned_untouched() {
        let custom = ModelParams::new().with("n_estimators", 20).with("max_depth", 2);
        let (pipeline, params) =
            build_pipeline_with(Engine::Builtin, &[], &names(&["tenure"]), custom.clone()).unwrap();
        assert_eq!(params, custom);
        assert_eq!(builtin_params(&pipeline).max_depth, 2);
        assert_eq!(pipeline.classifier().engine(), Engine::Builtin);
    }

    #[test]
    fn one_hot_layout_puts_categories_before_numerics() {
        let x = frame(&[Some("pro"), Some("basic"), None], &[1.0, 2.0, 3.0]);
        let mut pre = Preprocessor::new(&names(&["plan"]), &names(&["tenure"]));
        pre.fit(&x).unwrap();
        assert_eq!(
            pre.encoders().unwrap()[0].categories,
            vec![Some("basic".to_string()), Some("pro".to_string()), None]
        );
        let encoded = pre.transform(&x).unwrap();
        assert_eq!(encoded.ncols(), 4);
        assert_eq!(encoded.row(0).to_vec(), vec![0.0, 1.0, 0.0, 1.0]);
        assert_eq!(encoded.row(2).to_vec(), vec![0.0, 0.0, 1.0, 3.0]);
    }

    #[test]
    fn unseen_categories_encode_as_zeros() {
        let mut pre = Preprocessor::new(&names(&["plan"]), &names(&["tenure"]));
        pre.fit(&frame(&[Some("pro"), Some("basic")], &[1.0, 2.0])).unwrap();
        let encoded = pre.transform(&frame(&[Some("enterprise")], &[5.0])).unwrap();
        assert_eq!(encoded.row(0).to_vec(), vec![0.0, 0.0, 5.0]);
    }

    #[test]
    fn non_numeric_passthrough_is_a_schema_error() {
        let mut pre = Preprocessor::new(&[], &names(&["plan"]));
        let x = frame(&[Some("pro")], &[1.0]);
        pre.fit(&x).unwrap();
        assert!(matches!(pre.transform(&x), Err(ChurnError::SchemaMismatch(_))));
    }

    #[test]
    fn infinite_numeric_values_are_rejected() {
        let mut pre = Preprocessor::new(&[], &names(&["tenure"]));
        let x = frame(&[Some("pro"), Some("pro")], &[1.0, f64::INFINITY]);
        pre.fit(&x).unwrap();
        let err = pre.transform(&x).unwrap_err();
        assert!(err.to_string().contains("non-finite value 'inf'"));

        let gaps = Dataset::with_range_index(vec![Column::new(
            "tenure",
            ColumnData::Float(vec![Some(1.0), None]),
        )])
        .unwrap();
        assert!(pre.transform(&gaps).unwrap()[[1, 0]].is_nan());
    }

    #[test]
    fn missing_scoring_column_is_reported() {
        let mut pre = Preprocessor::new(&names(&["plan"]), &names(&["tenure"]));
        pre.fit(&frame(&[Some("pro")], &[1.0])).unwrap();
        let x = frame(&[Some("pro")], &[1.0]).without_column("tenure");
        assert!(matches!(pre.transform(&x), Err(ChurnError::MissingColumn { .. })));
    }

    #[test]
    fn fitted_pipeline_scores_unseen_categories() {
        let plans: Vec<Option<&str>> = (0..40)
            .map(|i| Some(if i % 2 == 0 { "pro" } else { "basic" }))
            .collect();
        let tenure: Vec<f64> = (0..40).map(f64::from).collect();
        let y: Vec<u8> = (0..40).map(|i| u8::from(i % 2 == 0)).collect();
        let params = ModelParams::new()
            .with("n_estimators", 10)
            .with("max_depth", 2)
            .with("min_child_weight", 0.0);
        let (mut pipeline, _) =
            build_pipeline_with(Engine::Builtin, &names(&["plan"]), &names(&["tenure"]), params)
                .unwrap();
        pipeline.fit(&frame(&plans, &tenure), &y).unwrap();

        let proba = pipeline
            .predict_proba(&frame(&[Some("pro"), Some("trial")], &[3.0, 3.0]))
            .unwrap();
        assert_eq!(proba.len(), 2);
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!(proba[0] > 0.5);
    }
}
