//! Filesystem repository for trained model artefacts.
//!
//! Layout under the output root:
//! `<market>/model_<market>.json`, `metrics.json`, `params.json`, `pred_<market>.csv`.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::common::error::ChurnResult;
use crate::data::{self, RowId};
use crate::evaluation::Metrics;

use super::domain::{ModelArtifact, ModelParams, ModelRepo};

/// Persist training outputs on the local filesystem.
pub struct FsModelRepo {
    root: PathBuf,
}

impl FsModelRepo {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding every output for `market`, created on demand.
    fn market_dir(&self, market: &str) -> ChurnResult<PathBuf> {
        let dir = self.root.join(market);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn model_path(&self, market: &str) -> PathBuf {
        self.root.join(market).join(format!("model_{market}.json"))
    }

    fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> ChurnResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        debug!(path = %path.display(), "wrote json");
        Ok(())
    }
}

impl ModelRepo for FsModelRepo {
    fn put_model(&self, artifact: &ModelArtifact) -> ChurnResult<PathBuf> {
        let market = &artifact.manifest.market;
        self.market_dir(market)?;
        let path = self.model_path(market);
        Self::write_json(&path, artifact)?;
        Ok(path)
    }

    fn get_model(&self, path: &Path) -> ChurnResult<ModelArtifact> {
        read_artifact(path)
    }

    fn put_metrics(&self, market: &str, metrics: &Metrics) -> ChurnResult<PathBuf> {
        let path = self.market_dir(market)?.join("metrics.json");
        Self::write_json(&path, metrics)?;
        Ok(path)
    }

    fn put_params(&self, market: &str, params: &ModelParams) -> ChurnResult<PathBuf> {
        let path = self.market_dir(market)?.join("params.json");
        Self::write_json(&path, params)?;
        Ok(path)
    }

    fn put_holdout_scores(
        &self,
        market: &str,
        index: &[RowId],
        scores: &[f64],
    ) -> ChurnResult<PathBuf> {
        let path = self.market_dir(market)?.join(format!("pred_{market}.csv"));
        data::write_scores(&path, index, scores)?;
        Ok(path)
    }
}

/// Read an artefact from an arbitrary path.
pub fn read_artifact(path: &Path) -> ChurnResult<ModelArtifact> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::Metrics;

    fn metrics() -> Metrics {
        Metrics {
            market: "AB".into(),
            n_rows_train: 8,
            n_rows_test: 2,
            n_features: 1,
            cat_cols: vec![],
            num_cols: vec!["tenure".into()],
            target: "churn".into(),
            test_positive_rate: 0.5,
            accuracy: 1.0,
            auc: None,
        }
    }

    #[test]
    fn writes_into_market_directory() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsModelRepo::new(dir.path());

        let metrics_path = repo.put_metrics("AB", &metrics()).unwrap();
        assert_eq!(metrics_path, dir.path().join("AB").join("metrics.json"));
        let text = fs::read_to_string(&metrics_path).unwrap();
        assert!(text.contains("\"auc\": null"));

        let params_path = repo.put_params("AB", &ModelParams::defaults()).unwrap();
        let back: ModelParams =
            serde_json::from_str(&fs::read_to_string(params_path).unwrap()).unwrap();
        assert_eq!(back, ModelParams::defaults());

        let pred_path = repo
            .put_holdout_scores("AB", &[RowId::Int(3), RowId::Int(1)], &[0.25, 0.75])
            .unwrap();
        assert_eq!(pred_path, dir.path().join("AB").join("pred_AB.csv"));
        assert_eq!(fs::read_to_string(pred_path).unwrap(), ",pred\n1,0.75\n3,0.25\n");
    }

    #[test]
    fn missing_artifact_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_artifact(&dir.path().join("model_AB.json")).unwrap_err();
        assert!(matches!(err, crate::common::ChurnError::Io(_)));
    }

    #[test]
    fn stored_model_reads_back_from_any_path() {
        use crate::data::ColumnRoles;
        use crate::training::{build_pipeline_with, Engine, ModelManifest};

        let dir = tempfile::tempdir().unwrap();
        let repo = FsModelRepo::new(dir.path().join("artifacts"));
        let roles = ColumnRoles {
            categorical: vec![],
            numerical: vec!["tenure".into()],
        };
        let (pipeline, params) =
            build_pipeline_with(Engine::Builtin, &[], &roles.numerical, ModelParams::new()).unwrap();
        let artifact = ModelArtifact {
            manifest: ModelManifest::new("AB", "churn", &roles, params, 0.5),
            pipeline,
        };
        let path = repo.put_model(&artifact).unwrap();

        let moved = dir.path().join("model_AB.json");
        fs::rename(&path, &moved).unwrap();
        let back = read_artifact(&moved).unwrap();
        assert_eq!(back.manifest, artifact.manifest);
        assert_eq!(back.pipeline, artifact.pipeline);
        assert!(repo.get_model(&dir.path().join("gone.json")).is_err());
    }
}
