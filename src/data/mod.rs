//! Data domain: loading, market filtering and target validation.

pub mod domain;
pub mod repo_fs;
pub mod service;

pub use domain::{Column, ColumnData, ColumnRole, ColumnRoles, ColumnType, Dataset, RowId};
pub use repo_fs::{load, write_scores};
pub use service::{
    holdout_split, infer_columns, normalize_target, select_features, select_market,
    split_features_target, HoldoutSplit, DEFAULT_SPLIT_SEED, DEFAULT_TEST_SIZE,
};
