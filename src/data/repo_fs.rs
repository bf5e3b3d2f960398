//! CSV reading and writing for datasets and score files.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use tracing::debug;

use crate::common::error::{ChurnError, ChurnResult};

use super::domain::{Column, ColumnData, Dataset, RowId};

/// Cell values treated as missing, mirroring the usual dataframe defaults.
const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn is_na(cell: &str) -> bool {
    NA_TOKENS.contains(&cell)
}

/// Load a CSV file from disk.
pub fn load(path: impl AsRef<Path>) -> ChurnResult<Dataset> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let dataset = read_csv(file, &path.display().to_string())?;
    debug!(
        path = %path.display(),
        rows = dataset.n_rows(),
        cols = dataset.n_cols(),
        "loaded dataset"
    );
    Ok(dataset)
}

/// Parse CSV from any reader. `origin` only feeds error messages.
///
/// A first column whose header is blank or starts with `unnamed` is promoted to
/// the row index.
pub fn read_csv<R: Read>(reader: R, origin: &str) -> ChurnResult<Dataset> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in csv_reader.records() {
        let record = record?;
        for (col, value) in cells.iter_mut().zip(record.iter()) {
            col.push(value.to_string());
        }
    }

    let rows = cells.first().map_or(0, Vec::len);
    if headers.is_empty() || rows == 0 {
        return Err(ChurnError::EmptyDataset {
            path: origin.to_string(),
        });
    }

    let promote_index = headers[0].trim().is_empty()
        || headers[0].to_lowercase().starts_with("unnamed");

    let mut named = headers.into_iter().zip(cells);
    let index = if promote_index {
        let (_, raw) = named.next().unwrap_or_default();
        parse_index(raw)
    } else {
        (0..rows as i64).map(RowId::Int).collect()
    };

    let columns = named
        .map(|(name, raw)| Column::new(name, infer_column(raw)))
        .collect();
    Dataset::new(index, columns)
}

fn parse_index(raw: Vec<String>) -> Vec<RowId> {
    let ints: Option<Vec<i64>> = raw.iter().map(|v| v.trim().parse().ok()).collect();
    match ints {
        Some(ids) => ids.into_iter().map(RowId::Int).collect(),
        None => raw.into_iter().map(RowId::Text).collect(),
    }
}

/// Pick the narrowest storage type every present cell parses as.
fn infer_column(raw: Vec<String>) -> ColumnData {
    let present = || raw.iter().filter(|v| !is_na(v));

    if present().next().is_none() {
        return ColumnData::Float(vec![None; raw.len()]);
    }
    if present().all(|v| v.trim().parse::<i64>().is_ok()) {
        return ColumnData::Int(
            raw.iter()
                .map(|v| if is_na(v) { None } else { v.trim().parse().ok() })
                .collect(),
        );
    }
    if present().all(|v| v.trim().parse::<f64>().is_ok()) {
        return ColumnData::Float(
            raw.iter()
                .map(|v| if is_na(v) { None } else { v.trim().parse().ok() })
                .collect(),
        );
    }
    if present().all(|v| parse_bool(v).is_some()) {
        return ColumnData::Bool(
            raw.iter()
                .map(|v| if is_na(v) { None } else { parse_bool(v) })
                .collect(),
        );
    }
    ColumnData::Text(
        raw.into_iter()
            .map(|v| if is_na(&v) { None } else { Some(v) })
            .collect(),
    )
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Write per-row probabilities sorted by row id, header `,pred`.
pub fn write_scores(path: impl AsRef<Path>, index: &[RowId], scores: &[f64]) -> ChurnResult<()> {
    let file = File::create(path.as_ref())?;
    write_scores_to(file, index, scores)
}

/// Writer-generic variant of [`write_scores`].
pub fn write_scores_to<W: Write>(writer: W, index: &[RowId], scores: &[f64]) -> ChurnResult<()> {
    if index.len() != scores.len() {
        return Err(ChurnError::SchemaMismatch(format!(
            "{} row ids for {} scores",
            index.len(),
            scores.len()
        )));
    }
    let mut rows: Vec<(&RowId, f64)> = index.iter().zip(scores.iter().copied()).collect();
    rows.sort_by(|a, b| a.0.cmp(b.0));

    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["", "pred"])?;
    for (id, score) in rows {
        wtr.write_record([id.to_string(), score.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}
