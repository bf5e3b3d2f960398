//! Dataset shaping: market filtering, target validation, feature selection and
//! the holdout split.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::common::error::{ChurnError, ChurnResult};

use super::domain::{ColumnRole, ColumnRoles, Dataset};

const POSITIVE_TOKENS: [&str; 3] = ["yes", "true", "1"];
const NEGATIVE_TOKENS: [&str; 3] = ["no", "false", "0"];

/// Fraction of rows held out for evaluation.
pub const DEFAULT_TEST_SIZE: f64 = 0.2;
/// Seed of the holdout shuffle.
pub const DEFAULT_SPLIT_SEED: u64 = 1;

/// Restrict `df` to one market and drop the market column.
///
/// The market column must exist even when no market is requested.
pub fn select_market(df: Dataset, market: Option<&str>, market_col: &str) -> ChurnResult<Dataset> {
    let column = df.require(market_col)?;
    let Some(market) = market else {
        return Ok(df);
    };

    let rows: Vec<usize> = (0..df.n_rows())
        .filter(|&row| column.data.text(row).as_deref() == Some(market))
        .collect();
    if rows.is_empty() {
        return Err(ChurnError::NoMatch {
            market: market.to_string(),
            column: market_col.to_string(),
        });
    }
    debug!(market, rows = rows.len(), "filtered market");
    Ok(df.take_rows(&rows).without_column(market_col))
}

/// Map the target column onto 0/1.
///
/// Values are compared trimmed and lowercased; the column must hold exactly two
/// distinct values, both from the yes/true/1 and no/false/0 vocabulary.
pub fn normalize_target(df: &Dataset, target: &str) -> ChurnResult<Vec<u8>> {
    let column = df.require(target)?;
    let normalized: Vec<String> = (0..df.n_rows())
        .map(|row| column.data.repr(row).trim().to_lowercase())
        .collect();

    let unique: BTreeSet<&str> = normalized.iter().map(String::as_str).collect();
    if unique.len() != 2 {
        return Err(ChurnError::NotBinary {
            target: target.to_string(),
            found: unique.into_iter().map(str::to_string).collect(),
        });
    }

    let invalid: Vec<String> = unique
        .iter()
        .filter(|v| !POSITIVE_TOKENS.contains(*v) && !NEGATIVE_TOKENS.contains(*v))
        .map(|v| v.to_string())
        .collect();
    if !invalid.is_empty() {
        return Err(ChurnError::UnsupportedValue {
            target: target.to_string(),
            invalid,
        });
    }

    Ok(normalized
        .iter()
        .map(|v| u8::from(POSITIVE_TOKENS.contains(&v.as_str())))
        .collect())
}

/// Split `df` into the feature table and the 0/1 target.
pub fn split_features_target(df: Dataset, target: &str) -> ChurnResult<(Dataset, Vec<u8>)> {
    df.require(target)?;
    let y = normalize_target(&df, target)?;
    Ok((df.without_column(target), y))
}

/// Restrict features to an allowlist, in allowlist order.
pub fn select_features(x: Dataset, features: Option<&[String]>) -> ChurnResult<Dataset> {
    match features {
        Some(features) if !features.is_empty() => x.select(features),
        _ => Ok(x),
    }
}

/// Partition columns into categorical and numerical roles.
pub fn infer_columns(x: &Dataset) -> ColumnRoles {
    let mut roles = ColumnRoles::default();
    for column in x.columns() {
        match ColumnRole::of(column.column_type()) {
            ColumnRole::Categorical => roles.categorical.push(column.name.clone()),
            ColumnRole::Numerical => roles.numerical.push(column.name.clone()),
        }
    }
    roles
}

/// Row positions of a train/test partition.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HoldoutSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Seeded shuffle split without stratification.
///
/// `ceil(test_size * n)` rows go to the test side; both sides must be non-empty.
pub fn holdout_split(n_rows: usize, test_size: f64, seed: u64) -> ChurnResult<HoldoutSplit> {
    let n_test = (test_size * n_rows as f64).ceil() as usize;
    if !(0.0..1.0).contains(&test_size) || n_test == 0 || n_test >= n_rows {
        return Err(ChurnError::InsufficientRows {
            rows: n_rows,
            test_size,
        });
    }

    let mut order: Vec<usize> = (0..n_rows).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let train = order.split_off(n_test);
    Ok(HoldoutSplit { train, test: order })
}
