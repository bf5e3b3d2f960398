//! Scoring orchestration: load a stored model and score a market's rows.

use std::fs;

use tracing::{debug, info};

use crate::common::error::ChurnResult;
use crate::data;
use crate::market::market_key;
use crate::training::repo_fs::read_artifact;

use super::domain::{
    check_manifest_columns, check_manifest_market, check_market_model_match, ScoreReport,
    ScoreRequest,
};

/// Score `request.data` with the model at `request.model`.
///
/// Writes `<outdir>/scored_<market>.csv`, one probability per row sorted by row id.
pub fn predict(request: &ScoreRequest) -> ChurnResult<ScoreReport> {
    let market = request.market.as_deref().filter(|m| !m.is_empty());
    check_market_model_match(&request.model, market)?;

    let artifact = read_artifact(&request.model)?;
    check_manifest_market(&artifact.manifest, market)?;
    info!(
        model = %request.model.display(),
        market = %artifact.manifest.market,
        trained_at = %artifact.manifest.trained_at,
        "loaded model"
    );

    let mut df = data::load(&request.data)?;
    if df.has_column(&request.target) {
        debug!(target = %request.target, "dropping target column before scoring");
        df = df.without_column(&request.target);
    }
    let df = data::select_market(df, market, &request.market_col)?;
    check_manifest_columns(&artifact.manifest, &df)?;

    let proba = artifact.pipeline.predict_proba(&df)?;

    fs::create_dir_all(&request.outdir)?;
    let scored_path = request
        .outdir
        .join(format!("scored_{}.csv", market_key(market)));
    data::write_scores(&scored_path, df.index(), &proba)?;

    info!(path = %scored_path.display(), rows = proba.len(), "scoring finished");
    Ok(ScoreReport::ok(&scored_path, proba.len()))
}
