//! Domain definitions for scoring requests and train/predict consistency checks.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::common::error::{ChurnError, ChurnResult};
use crate::common::ids::schema_fingerprint;
use crate::data::{ColumnRole, ColumnRoles, Dataset};
use crate::market::market_key;
use crate::training::domain::ModelManifest;

/// Everything needed to score a dataset with a stored model.
#[derive(Clone, Debug)]
pub struct ScoreRequest {
    pub data: PathBuf,
    pub model: PathBuf,
    pub market: Option<String>,
    pub market_col: String,
    pub target: String,
    pub outdir: PathBuf,
}

/// Success record of a scoring run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoreReport {
    pub status: &'static str,
    pub scored_path: String,
    pub n_scored: usize,
}

impl ScoreReport {
    pub fn ok(scored_path: &Path, n_scored: usize) -> Self {
        Self {
            status: "ok",
            scored_path: scored_path.display().to_string(),
            n_scored,
        }
    }
}

/// Compare the market encoded in a `model_<market>.<ext>` path with the requested one.
///
/// The token after the last `model_` up to the next `.` is the trained market.
/// Paths without `model_` are accepted.
pub fn check_market_model_match(model_path: &Path, market: Option<&str>) -> ChurnResult<()> {
    let path = model_path.to_string_lossy();
    let Some(pos) = path.rfind("model_") else {
        return Ok(());
    };
    let tail = &path[pos + "model_".len()..];
    let trained = tail.split('.').next().unwrap_or(tail);
    ensure_same_market(trained, market)
}

/// Compare the market recorded in the artefact manifest with the requested one.
pub fn check_manifest_market(manifest: &ModelManifest, market: Option<&str>) -> ChurnResult<()> {
    ensure_same_market(&manifest.market, market)
}

/// Every feature column the model was fitted on must be present in `df` and
/// resolve to the role it was fitted with.
///
/// Roles are re-inferred from `df` and fingerprinted like at training time. A
/// column with no values in `df` keeps its trained role.
pub fn check_manifest_columns(manifest: &ModelManifest, df: &Dataset) -> ChurnResult<()> {
    let trained = manifest
        .cat_cols
        .iter()
        .map(|name| (name, ColumnRole::Categorical))
        .chain(manifest.num_cols.iter().map(|name| (name, ColumnRole::Numerical)));

    let mut roles = ColumnRoles::default();
    for (name, trained_role) in trained {
        let column = df.require(name)?;
        let all_missing = (0..df.n_rows()).all(|row| column.data.text(row).is_none());
        let role = if all_missing {
            trained_role
        } else {
            ColumnRole::of(column.column_type())
        };
        match role {
            ColumnRole::Categorical => roles.categorical.push(name.clone()),
            ColumnRole::Numerical => roles.numerical.push(name.clone()),
        }
    }

    if schema_fingerprint(&roles.categorical, &roles.numerical) != manifest.schema_fingerprint {
        return Err(ChurnError::SchemaMismatch(format!(
            "model was fitted on categorical {:?} and numerical {:?}, \
             scoring data has categorical {:?} and numerical {:?}",
            manifest.cat_cols, manifest.num_cols, roles.categorical, roles.numerical
        )));
    }
    Ok(())
}

fn ensure_same_market(trained: &str, market: Option<&str>) -> ChurnResult<()> {
    let requested = market_key(market);
    if trained == requested {
        Ok(())
    } else {
        Err(ChurnError::MarketMismatch {
            trained: trained.to_string(),
            requested: requested.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Column, ColumnData, ColumnRoles};
    use crate::training::domain::ModelParams;

    #[test]
    fn filename_check_matches_market_token() {
        assert!(check_market_model_match(Path::new("artifacts/AB/model_AB.json"), Some("AB")).is_ok());
        assert!(check_market_model_match(Path::new("model_default.json"), None).is_ok());
        assert!(check_market_model_match(Path::new("model_default.json"), Some("")).is_ok());
        assert!(check_market_model_match(Path::new("some/other.json"), Some("AB")).is_ok());
    }

    #[test]
    fn filename_check_rejects_other_market() {
        let err = check_market_model_match(Path::new("model_AB.json"), Some("CD")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Model trained on market='AB', but predicting on market='CD'. \
             Cross-market prediction is not supported."
        );
        assert!(check_market_model_match(Path::new("model_AB.json"), None).is_err());
    }

    #[test]
    fn extension_does_not_matter() {
        let path = Path::new("artifacts/AB/model_AB.joblib");
        assert!(check_market_model_match(path, Some("AB")).is_ok());
        assert!(matches!(
            check_market_model_match(path, Some("CD")),
            Err(ChurnError::MarketMismatch { .. })
        ));
    }

    #[test]
    fn filename_check_uses_last_occurrence() {
        let path = Path::new("model_runs/model_CD.json");
        assert!(check_market_model_match(path, Some("CD")).is_ok());
        assert!(check_market_model_match(path, Some("runs")).is_err());
    }

    #[test]
    fn manifest_checks() {
        let roles = ColumnRoles {
            categorical: vec!["plan".into()],
            numerical: vec!["tenure".into()],
        };
        let manifest = ModelManifest::new("AB", "churn", &roles, ModelParams::defaults(), 0.5);
        assert!(check_manifest_market(&manifest, Some("AB")).is_ok());
        assert!(matches!(
            check_manifest_market(&manifest, Some("CD")),
            Err(ChurnError::MarketMismatch { .. })
        ));

        let df = Dataset::with_range_index(vec![Column::new(
            "tenure",
            ColumnData::Int(vec![Some(1)]),
        )])
        .unwrap();
        assert!(matches!(
            check_manifest_columns(&manifest, &df),
            Err(ChurnError::MissingColumn { .. })
        ));
    }

    fn scoring_frame(plan: ColumnData) -> Dataset {
        Dataset::with_range_index(vec![
            Column::new("tenure", ColumnData::Int(vec![Some(3), Some(9)])),
            Column::new("plan", plan),
        ])
        .unwrap()
    }

    #[test]
    fn manifest_fingerprint_guards_column_roles() {
        let roles = ColumnRoles {
            categorical: vec!["plan".into()],
            numerical: vec!["tenure".into()],
        };
        let manifest = ModelManifest::new("AB", "churn", &roles, ModelParams::defaults(), 0.5);

        let same = scoring_frame(ColumnData::Text(vec![Some("pro".into()), None]));
        assert!(check_manifest_columns(&manifest, &same).is_ok());

        let empty = scoring_frame(ColumnData::Float(vec![None, None]));
        assert!(check_manifest_columns(&manifest, &empty).is_ok());

        let recoded = scoring_frame(ColumnData::Int(vec![Some(1), Some(2)]));
        let err = check_manifest_columns(&manifest, &recoded).unwrap_err();
        assert!(matches!(err, ChurnError::SchemaMismatch(_)));
        assert!(err.to_string().contains("scoring data has categorical []"));
    }
}
