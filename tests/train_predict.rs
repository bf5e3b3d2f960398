use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use churnline::common::ChurnError;
use churnline::data::holdout_split;
use churnline::inference::{predict, ScoreRequest};
use churnline::market::{MarketConfig, StaticMarketConfigProvider};
use churnline::training::{train, ModelParams, TrainRequest};

const ROWS_PER_MARKET: usize = 60;

fn small_params() -> ModelParams {
    ModelParams::new()
        .with("n_estimators", 20)
        .with("max_depth", 3)
        .with("learning_rate", 0.3)
        .with("subsample", 0.8)
        .with("random_state", 7)
}

fn configs() -> StaticMarketConfigProvider {
    let config = MarketConfig {
        model_params: small_params(),
        ..MarketConfig::default()
    };
    StaticMarketConfigProvider::new()
        .with("AB", config.clone())
        .with("CD", config.clone())
        .with("default", config)
}

/// Two markets interleaved, an unnamed index column and a Yes/no target.
fn write_customers(dir: &Path) -> PathBuf {
    let mut text = String::from(",country,tenure,plan_type,monthly_fee,churn\n");
    for i in 0..ROWS_PER_MARKET * 2 {
        let country = if i % 2 == 0 { "AB" } else { "CD" };
        let tenure = (i * 7) % 24;
        let plan = ["basic", "pro", "family"][i % 3];
        let fee = 10.0 + (i % 5) as f64 * 2.5;
        let churn = if tenure < 8 || i % 11 == 0 { "Yes" } else { "no" };
        writeln!(text, "{},{country},{tenure},{plan},{fee},{churn}", 1000 + i).unwrap();
    }
    let path = dir.join("customers.csv");
    fs::write(&path, text).unwrap();
    path
}

fn train_request(data: &Path, market: Option<&str>, outdir: &Path) -> TrainRequest {
    TrainRequest {
        data: data.to_path_buf(),
        market: market.map(str::to_string),
        market_col: "country".into(),
        target: "churn".into(),
        outdir: outdir.to_path_buf(),
    }
}

fn score_request(data: &Path, model: &Path, market: Option<&str>, outdir: &Path) -> ScoreRequest {
    ScoreRequest {
        data: data.to_path_buf(),
        model: model.to_path_buf(),
        market: market.map(str::to_string),
        market_col: "country".into(),
        target: "churn".into(),
        outdir: outdir.to_path_buf(),
    }
}

fn read_scores(path: &Path) -> Vec<(String, String)> {
    let mut rdr = csv::Reader::from_path(path).unwrap();
    let headers = rdr.headers().unwrap().clone();
    assert_eq!(headers.iter().collect::<Vec<_>>(), vec!["", "pred"]);
    rdr.records()
        .map(|r| {
            let r = r.unwrap();
            (r[0].to_string(), r[1].to_string())
        })
        .collect()
}

#[test]
fn train_writes_artifacts_and_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_customers(dir.path());
    let outdir = dir.path().join("artifacts");

    let report = train(&train_request(&data, Some("AB"), &outdir), &configs()).unwrap();

    let market_dir = outdir.join("AB");
    assert_eq!(PathBuf::from(&report.model_path), market_dir.join("model_AB.json"));
    for file in ["model_AB.json", "metrics.json", "params.json", "pred_AB.csv"] {
        assert!(market_dir.join(file).is_file(), "{file} missing");
    }

    let metrics = &report.metrics;
    assert_eq!(metrics.market, "AB");
    assert_eq!(metrics.n_rows_test, 12);
    assert_eq!(metrics.n_rows_train, 48);
    assert_eq!(metrics.n_features, 3);
    assert_eq!(metrics.cat_cols, vec!["plan_type"]);
    assert_eq!(metrics.num_cols, vec!["tenure", "monthly_fee"]);
    assert_eq!(metrics.target, "churn");
    assert!((0.0..=1.0).contains(&metrics.accuracy));
    assert!((0.0..=1.0).contains(&metrics.test_positive_rate));

    let stored: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(market_dir.join("metrics.json")).unwrap())
            .unwrap();
    assert_eq!(stored["n_rows_test"], 12);
    assert!(stored.get("model_path").is_none());

    let params: ModelParams =
        serde_json::from_str(&fs::read_to_string(market_dir.join("params.json")).unwrap())
            .unwrap();
    assert_eq!(params, small_params());

    let holdout = read_scores(&market_dir.join("pred_AB.csv"));
    assert_eq!(holdout.len(), 12);
    let ids: Vec<i64> = holdout.iter().map(|(id, _)| id.parse().unwrap()).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    assert!(ids.iter().all(|id| id % 2 == 0), "only AB rows carry even ids");
}

#[test]
fn predict_reproduces_holdout_probabilities() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_customers(dir.path());
    let outdir = dir.path().join("artifacts");
    let report = train(&train_request(&data, Some("AB"), &outdir), &configs()).unwrap();

    let scored_dir = dir.path().join("scored");
    let scored = predict(&score_request(
        &data,
        Path::new(&report.model_path),
        Some("AB"),
        &scored_dir,
    ))
    .unwrap();
    assert_eq!(scored.status, "ok");
    assert_eq!(scored.n_scored, ROWS_PER_MARKET);
    assert_eq!(PathBuf::from(&scored.scored_path), scored_dir.join("scored_AB.csv"));

    let all: HashMap<String, String> = read_scores(Path::new(&scored.scored_path))
        .into_iter()
        .collect();
    assert_eq!(all.len(), ROWS_PER_MARKET);
    for (id, pred) in read_scores(&outdir.join("AB").join("pred_AB.csv")) {
        assert_eq!(all.get(&id), Some(&pred), "row {id} scored differently");
    }
}

#[test]
fn predict_rejects_model_of_other_market_by_filename() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_customers(dir.path());
    let outdir = dir.path().join("artifacts");
    let report = train(&train_request(&data, Some("AB"), &outdir), &configs()).unwrap();

    let err = predict(&score_request(
        &data,
        Path::new(&report.model_path),
        Some("CD"),
        &dir.path().join("scored"),
    ))
    .unwrap_err();
    assert!(matches!(err, ChurnError::MarketMismatch { .. }));
    assert!(err.to_string().contains("market='AB'"));
    assert!(!dir.path().join("scored").exists());
}

#[test]
fn predict_rejects_renamed_artifact_by_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_customers(dir.path());
    let outdir = dir.path().join("artifacts");
    let report = train(&train_request(&data, Some("AB"), &outdir), &configs()).unwrap();

    let renamed = dir.path().join("model_CD.json");
    fs::copy(&report.model_path, &renamed).unwrap();
    let err = predict(&score_request(&data, &renamed, Some("CD"), dir.path())).unwrap_err();
    assert!(matches!(
        err,
        ChurnError::MarketMismatch { ref trained, ref requested } if trained == "AB" && requested == "CD"
    ));

    let anonymous = dir.path().join("churn.json");
    fs::copy(&report.model_path, &anonymous).unwrap();
    assert!(predict(&score_request(&data, &anonymous, Some("CD"), dir.path())).is_err());
    assert!(predict(&score_request(&data, &anonymous, Some("AB"), dir.path())).is_ok());
}

#[test]
fn training_without_market_uses_default_key() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_customers(dir.path());
    let outdir = dir.path().join("artifacts");

    let report = train(&train_request(&data, None, &outdir), &configs()).unwrap();
    assert_eq!(report.metrics.market, "default");
    assert_eq!(report.metrics.n_rows_test + report.metrics.n_rows_train, ROWS_PER_MARKET * 2);
    // The market column stays a feature when no market is selected.
    assert!(report.metrics.cat_cols.contains(&"country".to_string()));
    assert!(outdir.join("default").join("model_default.json").is_file());
}

#[test]
fn single_class_holdout_reports_null_auc() {
    let dir = tempfile::tempdir().unwrap();
    let n = 30;
    let split = holdout_split(n, 0.2, 1).unwrap();
    let mut text = String::from("country,tenure,churn\n");
    for row in 0..n {
        let churn = if split.test.contains(&row) || row % 2 == 0 { "no" } else { "yes" };
        writeln!(text, "AB,{row},{churn}").unwrap();
    }
    let data = dir.path().join("single.csv");
    fs::write(&data, text).unwrap();

    let request = train_request(&data, Some("AB"), &dir.path().join("out"));
    let report = train(&request, &configs()).unwrap();
    assert_eq!(report.metrics.auc, None);
    assert_eq!(report.metrics.test_positive_rate, 0.0);

    let stored = fs::read_to_string(dir.path().join("out/AB/metrics.json")).unwrap();
    assert!(stored.contains("\"auc\": null"));
}

#[test]
fn rejects_unsupported_target_values() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("bad.csv");
    fs::write(&data, "country,tenure,churn\nAB,1,A\nAB,2,B\nAB,3,A\n").unwrap();
    let err = train(&train_request(&data, Some("AB"), dir.path()), &configs()).unwrap_err();
    assert!(matches!(err, ChurnError::UnsupportedValue { .. }));

    fs::write(&data, "country,tenure,churn\nAB,1,yes\nAB,2,no\nAB,3,maybe\n").unwrap();
    let err = train(&train_request(&data, Some("AB"), dir.path()), &configs()).unwrap_err();
    assert!(matches!(err, ChurnError::NotBinary { .. }));
}

/// 40 AB rows where every tenth `fee` is infinite.
fn write_fees(dir: &Path, inf_every: Option<usize>) -> PathBuf {
    let mut text = String::from("country,fee,tenure,churn\n");
    for i in 0..40 {
        let fee = match inf_every {
            Some(n) if i % n == 0 => "inf".to_string(),
            _ => format!("{}", 10.0 + (i % 4) as f64 * 2.5),
        };
        let churn = if i % 3 == 0 { "yes" } else { "no" };
        writeln!(text, "AB,{fee},{},{churn}", i % 12).unwrap();
    }
    let path = dir.join(if inf_every.is_some() { "fees_inf.csv" } else { "fees.csv" });
    fs::write(&path, text).unwrap();
    path
}

fn five_trees() -> StaticMarketConfigProvider {
    StaticMarketConfigProvider::new().with(
        "AB",
        MarketConfig {
            model_params: ModelParams::new()
                .with("n_estimators", 5)
                .with("random_state", 1),
            ..MarketConfig::default()
        },
    )
}

#[test]
fn infinite_feature_values_fail_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let outdir = dir.path().join("out");
    let with_inf = write_fees(dir.path(), Some(10));

    let err = train(&train_request(&with_inf, Some("AB"), &outdir), &five_trees()).unwrap_err();
    assert!(matches!(err, ChurnError::SchemaMismatch(_)));
    assert!(err.to_string().contains("column 'fee' holds non-finite value 'inf'"));
    assert!(!outdir.join("AB").join("model_AB.json").exists());

    let clean = write_fees(dir.path(), None);
    let report = train(&train_request(&clean, Some("AB"), &outdir), &five_trees()).unwrap();
    let err = predict(&score_request(
        &with_inf,
        Path::new(&report.model_path),
        Some("AB"),
        &dir.path().join("scored"),
    ))
    .unwrap_err();
    assert!(matches!(err, ChurnError::SchemaMismatch(_)));
    assert!(!dir.path().join("scored").join("scored_AB.csv").exists());
}

#[test]
fn predict_rejects_feature_whose_role_changed() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_customers(dir.path());
    let outdir = dir.path().join("artifacts");
    let report = train(&train_request(&data, Some("AB"), &outdir), &configs()).unwrap();

    // plan_type arrives as numeric codes instead of labels.
    let text = fs::read_to_string(&data).unwrap();
    let recoded = text
        .replace(",basic,", ",1,")
        .replace(",pro,", ",2,")
        .replace(",family,", ",3,");
    let recoded_path = dir.path().join("recoded.csv");
    fs::write(&recoded_path, recoded).unwrap();

    let err = predict(&score_request(
        &recoded_path,
        Path::new(&report.model_path),
        Some("AB"),
        &dir.path().join("scored"),
    ))
    .unwrap_err();
    assert!(matches!(err, ChurnError::SchemaMismatch(_)));
    assert!(err.to_string().contains("plan_type"));
}
