//! Header-relative row extraction from BA900 CSV extracts.
//!
//! A BA900 CSV is a stack of sub-tables. Each sub-table starts with a header
//! row whose first cell is `Description`, followed by item rows whose first
//! cell is the item label. A target row is named by its header: the last
//! `Description` row at or above the first target match. That single header
//! is applied to every match in the file.

use crate::record::FieldMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// First-cell marker of a header row.
pub const HEADER_MARKER: &str = "Description";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("none of the targets {targets:?} found in {path}")]
    TargetsNotFound { path: PathBuf, targets: Vec<String> },

    #[error("no 'Description' row found before the first target in {path}")]
    HeaderNotFound { path: PathBuf },
}

/// A matched target row keyed by the shared header.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRow {
    /// Zero-based CSV record index. Blank lines are not records and are not counted.
    pub row_index: usize,
    /// First cell of the row (the matched target).
    pub label: String,
    /// Header column name to cell; cells past the end of a short row are `None`.
    pub values: FieldMap,
}

/// Read a CSV file into ragged rows, without header interpretation.
pub fn read_rows(path: &Path) -> Result<Vec<Vec<String>>, ExtractError> {
    let read_err = |source| ExtractError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(read_err)?;

    rdr.records()
        .map(|rec| {
            rec.map(|r| r.iter().map(String::from).collect())
                .map_err(read_err)
        })
        .collect()
}

/// Locate `targets` in the CSV at `path` and key each match by the header.
pub fn find_target_rows(path: &Path, targets: &[&str]) -> Result<Vec<LabeledRow>, ExtractError> {
    let rows = read_rows(path)?;
    extract_from_rows(&rows, targets, path)
}

/// Same as [`find_target_rows`] over rows already in memory. `path` is only
/// used in error messages.
pub fn extract_from_rows(
    rows: &[Vec<String>],
    targets: &[&str],
    path: &Path,
) -> Result<Vec<LabeledRow>, ExtractError> {
    let first_cells: Vec<&str> = rows
        .iter()
        .map(|row| row.first().map(String::as_str).unwrap_or(""))
        .collect();

    let matches: Vec<usize> = first_cells
        .iter()
        .enumerate()
        .filter(|(_, cell)| targets.contains(*cell))
        .map(|(i, _)| i)
        .collect();

    let first_match = match matches.first() {
        Some(&i) => i,
        None => {
            return Err(ExtractError::TargetsNotFound {
                path: path.to_path_buf(),
                targets: targets.iter().map(|t| t.to_string()).collect(),
            })
        }
    };

    let header_index = first_cells[..=first_match]
        .iter()
        .rposition(|cell| *cell == HEADER_MARKER)
        .ok_or_else(|| ExtractError::HeaderNotFound {
            path: path.to_path_buf(),
        })?;
    let header = &rows[header_index];

    Ok(matches
        .into_iter()
        .map(|i| {
            let row = &rows[i];
            let mut values = FieldMap::new();
            for (col, name) in header.iter().enumerate() {
                values.insert(name.clone(), row.get(col).cloned());
            }
            LabeledRow {
                row_index: i,
                label: first_cells[i].to_string(),
                values,
            }
        })
        .collect())
}
