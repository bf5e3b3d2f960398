//! Error handling primitives shared across the crate.
//!
//! Every failure surfaces as a [`ChurnError`]. The CLI renders them uniformly,
//! the [`ErrorCode`] table only exists so callers embedding the library can
//! branch on a stable number instead of matching message text.

use thiserror::Error;

/// Stable error codes, one per failure family.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorCode {
    /// Input resource yielded no rows.
    EmptyDataset = 1,
    /// A required column was not present.
    MissingColumn = 2,
    /// Market filter matched nothing.
    NoMatch = 3,
    /// Target column is not two-valued.
    NotBinary = 4,
    /// Target column uses tokens outside the accepted yes/no vocabulary.
    UnsupportedValue = 5,
    /// Market configuration could not be parsed.
    ConfigParse = 6,
    /// Model artefact belongs to a different market.
    MarketMismatch = 7,
    /// Hyperparameter value has the wrong type or range.
    InvalidParam = 8,
    /// Too few rows to carve out a holdout split.
    InsufficientRows = 9,
    /// Scoring data does not fit the fitted pipeline.
    SchemaMismatch = 10,
    /// Filesystem or serialisation failure from an underlying library.
    Io = 11,
    /// Classifier engine failed or is not compiled in.
    Engine = 12,
}

/// Canonical error type for the crate.
#[derive(Debug, Error)]
pub enum ChurnError {
    #[error("No data found in file: {path}")]
    EmptyDataset { path: String },

    #[error("Column '{column}' not found in dataset. Available: {available:?}")]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("No data found for market='{market}' in column '{column}'.")]
    NoMatch { market: String, column: String },

    #[error("Target column '{target}' must be binary. Found values: {found:?}")]
    NotBinary { target: String, found: Vec<String> },

    #[error("Target column '{target}' contains unsupported values: {invalid:?}")]
    UnsupportedValue { target: String, invalid: Vec<String> },

    #[error("Failed to parse market config '{source_name}': {reason}")]
    ConfigParse { source_name: String, reason: String },

    #[error(
        "Model trained on market='{trained}', but predicting on market='{requested}'. \
         Cross-market prediction is not supported."
    )]
    MarketMismatch { trained: String, requested: String },

    #[error("Invalid value for hyperparameter '{name}': {reason}")]
    InvalidParam { name: String, reason: String },

    #[error("Cannot split {rows} rows into train/test partitions with test_size={test_size}")]
    InsufficientRows { rows: usize, test_size: f64 },

    #[error("Input does not match the fitted pipeline: {0}")]
    SchemaMismatch(String),

    #[error("Classifier engine error: {0}")]
    Engine(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type ChurnResult<T> = Result<T, ChurnError>;

impl ChurnError {
    /// Stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ChurnError::EmptyDataset { .. } => ErrorCode::EmptyDataset,
            ChurnError::MissingColumn { .. } => ErrorCode::MissingColumn,
            ChurnError::NoMatch { .. } => ErrorCode::NoMatch,
            ChurnError::NotBinary { .. } => ErrorCode::NotBinary,
            ChurnError::UnsupportedValue { .. } => ErrorCode::UnsupportedValue,
            ChurnError::ConfigParse { .. } => ErrorCode::ConfigParse,
            ChurnError::MarketMismatch { .. } => ErrorCode::MarketMismatch,
            ChurnError::InvalidParam { .. } => ErrorCode::InvalidParam,
            ChurnError::InsufficientRows { .. } => ErrorCode::InsufficientRows,
            ChurnError::SchemaMismatch(_) => ErrorCode::SchemaMismatch,
            ChurnError::Engine(_) => ErrorCode::Engine,
            ChurnError::Io(_) | ChurnError::Csv(_) | ChurnError::Json(_) => ErrorCode::Io,
        }
    }

    /// Missing column helper that captures the columns which were available.
    pub fn missing_column<'a, I>(column: &str, available: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::MissingColumn {
            column: column.to_string(),
            available: available.into_iter().map(str::to_string).collect(),
        }
    }

    /// Hyperparameter helper.
    pub fn invalid_param(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParam {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
