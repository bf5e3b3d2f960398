//! Core dataset definitions.
//!
//! A [`Dataset`] is column-major: every column owns a typed, nullable vector and
//! all columns share one row index.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::error::{ChurnError, ChurnResult};

/// Row identifier. Integer ids sort before text ids.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Int(v) => write!(f, "{v}"),
            RowId::Text(v) => f.write_str(v),
        }
    }
}

/// Declared storage type of a column.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int,
    Float,
    Bool,
    Text,
}

/// Role a column plays in the preprocessing stage.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ColumnRole {
    Categorical,
    Numerical,
}

impl ColumnRole {
    /// Text columns are one-hot encoded; everything else passes through.
    pub fn of(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Text => ColumnRole::Categorical,
            ColumnType::Int | ColumnType::Float | ColumnType::Bool => ColumnRole::Numerical,
        }
    }
}

/// Partition of feature columns by role, each group in original column order.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ColumnRoles {
    pub categorical: Vec<String>,
    pub numerical: Vec<String>,
}

/// Typed, nullable column storage.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnData {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
    Text(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnData::Int(_) => ColumnType::Int,
            ColumnData::Float(_) => ColumnType::Float,
            ColumnData::Bool(_) => ColumnType::Bool,
            ColumnData::Text(_) => ColumnType::Text,
        }
    }

    /// Copy out the given rows, in the given order.
    pub fn take(&self, rows: &[usize]) -> Self {
        fn pick<T: Clone>(values: &[T], rows: &[usize]) -> Vec<T> {
            rows.iter().map(|&r| values[r].clone()).collect()
        }
        match self {
            ColumnData::Int(v) => ColumnData::Int(pick(v, rows)),
            ColumnData::Float(v) => ColumnData::Float(pick(v, rows)),
            ColumnData::Bool(v) => ColumnData::Bool(pick(v, rows)),
            ColumnData::Text(v) => ColumnData::Text(pick(v, rows)),
        }
    }

    /// Plain textual value of a cell, `None` when missing.
    pub fn text(&self, row: usize) -> Option<String> {
        match self {
            ColumnData::Int(v) => v[row].map(|x| x.to_string()),
            ColumnData::Float(v) => v[row].map(float_repr),
            ColumnData::Bool(v) => v[row].map(|b| String::from(if b { "True" } else { "False" })),
            ColumnData::Text(v) => v[row].clone(),
        }
    }

    /// Textual value with missing cells rendered as `nan`.
    pub fn repr(&self, row: usize) -> String {
        self.text(row).unwrap_or_else(|| "nan".to_string())
    }

    /// Numeric view of a cell. Missing cells become `NaN`; text that does not
    /// parse as a number yields `None`.
    pub fn numeric(&self, row: usize) -> Option<f64> {
        match self {
            ColumnData::Int(v) => Some(v[row].map_or(f64::NAN, |x| x as f64)),
            ColumnData::Float(v) => Some(v[row].unwrap_or(f64::NAN)),
            ColumnData::Bool(v) => Some(v[row].map_or(f64::NAN, |b| if b { 1.0 } else { 0.0 })),
            ColumnData::Text(v) => match &v[row] {
                None => Some(f64::NAN),
                Some(s) => s.trim().parse::<f64>().ok(),
            },
        }
    }
}

/// Python-style float rendering: integral values keep a trailing `.0`.
fn float_repr(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        let sign = if value > 0.0 { "" } else { "-" };
        format!("{sign}inf")
    } else if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Named column.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn column_type(&self) -> ColumnType {
        self.data.column_type()
    }
}

/// In-memory table with a row index and ordered columns.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    index: Vec<RowId>,
    columns: Vec<Column>,
}

impl Dataset {
    /// Build a dataset, checking every column matches the index length.
    pub fn new(index: Vec<RowId>, columns: Vec<Column>) -> ChurnResult<Self> {
        if let Some(bad) = columns.iter().find(|c| c.data.len() != index.len()) {
            return Err(ChurnError::SchemaMismatch(format!(
                "column '{}' has {} rows, index has {}",
                bad.name,
                bad.data.len(),
                index.len()
            )));
        }
        Ok(Self { index, columns })
    }

    /// Build a dataset with the default `0..n` index.
    pub fn with_range_index(columns: Vec<Column>) -> ChurnResult<Self> {
        let rows = columns.first().map_or(0, |c| c.data.len());
        let index = (0..rows as i64).map(RowId::Int).collect();
        Self::new(index, columns)
    }

    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[RowId] {
        &self.index
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Column lookup that reports the available names on failure.
    pub fn require(&self, name: &str) -> ChurnResult<&Column> {
        self.column(name)
            .ok_or_else(|| ChurnError::missing_column(name, self.column_names()))
    }

    /// Keep only the given rows, in the given order.
    pub fn take_rows(&self, rows: &[usize]) -> Self {
        Self {
            index: rows.iter().map(|&r| self.index[r].clone()).collect(),
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.data.take(rows)))
                .collect(),
        }
    }

    /// Remove a column if present.
    pub fn without_column(mut self, name: &str) -> Self {
        self.columns.retain(|c| c.name != name);
        self
    }

    /// Project onto the named columns, in the given order.
    pub fn select(&self, names: &[String]) -> ChurnResult<Self> {
        let columns = names
            .iter()
            .map(|name| self.require(name).cloned())
            .collect::<ChurnResult<Vec<_>>>()?;
        Ok(Self {
            index: self.index.clone(),
            columns,
        })
    }
}
