//! Service layer orchestrating dataset ingestion and model training.

use tracing::info;

use crate::common::error::ChurnResult;
use crate::data::{self, DEFAULT_SPLIT_SEED, DEFAULT_TEST_SIZE};
use crate::evaluation::{self, HoldoutEval};
use crate::market::{self, market_key, MarketConfigProvider};

use super::domain::{ModelArtifact, ModelManifest, ModelRepo, TrainReport, TrainRequest};
use super::pipeline::build_pipeline;
use super::repo_fs::FsModelRepo;

/// Train a market model and write its outputs under `request.outdir`.
pub fn train(
    request: &TrainRequest,
    configs: &dyn MarketConfigProvider,
) -> ChurnResult<TrainReport> {
    let repo = FsModelRepo::new(&request.outdir);
    train_with_repo(request, configs, &repo)
}

/// [`train`] against an arbitrary repository.
pub fn train_with_repo(
    request: &TrainRequest,
    configs: &dyn MarketConfigProvider,
    repo: &dyn ModelRepo,
) -> ChurnResult<TrainReport> {
    let market = request.market.as_deref().filter(|m| !m.is_empty());
    let key = market_key(market);
    info!(data = %request.data.display(), market = key, "training started");

    let df = data::load(&request.data)?;
    let df = data::select_market(df, market, &request.market_col)?;
    let config = market::load_market_config(configs, market)?;

    let (x, y) = data::split_features_target(df, &request.target)?;
    let x = data::select_features(x, config.features.as_deref())?;
    let roles = data::infer_columns(&x);
    info!(
        categorical = roles.categorical.len(),
        numerical = roles.numerical.len(),
        "inferred column roles"
    );

    let (mut pipeline, params) = build_pipeline(
        &roles.categorical,
        &roles.numerical,
        config.model_params.clone(),
    )?;

    let split = data::holdout_split(x.n_rows(), DEFAULT_TEST_SIZE, DEFAULT_SPLIT_SEED)?;
    let x_train = x.take_rows(&split.train);
    let x_test = x.take_rows(&split.test);
    let y_train: Vec<u8> = split.train.iter().map(|&r| y[r]).collect();
    let y_test: Vec<u8> = split.test.iter().map(|&r| y[r]).collect();

    pipeline.fit(&x_train, &y_train)?;
    let proba = pipeline.predict_proba(&x_test)?;

    let threshold = config.threshold();
    let metrics = evaluation::evaluate(HoldoutEval {
        market: key,
        target: &request.target,
        roles: &roles,
        n_rows_train: x_train.n_rows(),
        y_test: &y_test,
        proba: &proba,
        threshold,
    });

    let artifact = ModelArtifact {
        manifest: ModelManifest::new(key, &request.target, &roles, params.clone(), threshold),
        pipeline,
    };
    let model_path = repo.put_model(&artifact)?;
    repo.put_metrics(key, &metrics)?;
    repo.put_params(key, &params)?;
    repo.put_holdout_scores(key, x_test.index(), &proba)?;

    info!(
        model = %model_path.display(),
        accuracy = metrics.accuracy,
        auc = ?metrics.auc,
        "training finished"
    );
    Ok(TrainReport {
        metrics,
        model_path: model_path.display().to_string(),
    })
}
