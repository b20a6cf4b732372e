//! Impairment/loan aggregation across dated BA900 extracts.
//!
//! Layout: `{data_dir}/BA900_{YYYY-MM-DD}_zipcsv/TOTAL.csv`
//!
//! For every matching directory the impairments and loans rows are pulled out
//! of the data file, their value column is parsed as a number, and one row per
//! date is produced with `NPL = impairments / loans`.

use crate::config::AggregateConfig;
use crate::extract::{find_target_rows, ExtractError};
use crate::output::write_atomic;
use chrono::NaiveDate;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// Header of the derived ratio column.
pub const NPL_COLUMN: &str = "NPL";

/// Header of the index column in the output file.
pub const DATE_COLUMN: &str = "date";

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("failed to list {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("directory '{name}' does not name a valid calendar date")]
    InvalidDate { name: String },

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("column '{column}' missing from the header in {path}")]
    MissingValueColumn { path: PathBuf, column: String },

    #[error("target '{label}' not found in {path}")]
    MissingTarget { path: PathBuf, label: String },

    #[error("duplicate observation for '{label}' on {date} in {path}")]
    DuplicateObservation {
        path: PathBuf,
        date: NaiveDate,
        label: String,
    },

    #[error("non-numeric value '{value}' for '{label}' in {path}")]
    NotNumeric {
        path: PathBuf,
        label: String,
        value: String,
    },

    #[error("failed to write {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}

/// One pivoted date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NplRow {
    pub date: NaiveDate,
    pub impairments: f64,
    pub loans: f64,
    pub npl: f64,
}

impl NplRow {
    pub fn new(date: NaiveDate, impairments: f64, loans: f64) -> Self {
        Self {
            date,
            impairments,
            loans,
            npl: impairments / loans,
        }
    }
}

/// Pivoted table: one row per date, ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct NplTable {
    pub impairments_label: String,
    pub loans_label: String,
    pub rows: Vec<NplRow>,
}

impl NplTable {
    pub fn empty(config: &AggregateConfig) -> Self {
        Self {
            impairments_label: config.impairments_label.clone(),
            loans_label: config.loans_label.clone(),
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Output header: `date`, the two target labels, `NPL`.
    pub fn columns(&self) -> [&str; 4] {
        [
            DATE_COLUMN,
            self.impairments_label.as_str(),
            self.loans_label.as_str(),
            NPL_COLUMN,
        ]
    }

    /// Render as CSV. NaN values are written as empty cells; whole numbers
    /// have no fractional part.
    pub fn to_csv(&self) -> Result<String, csv::Error> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.write_record(self.columns())?;
        for row in &self.rows {
            wtr.write_record([
                row.date.format("%Y-%m-%d").to_string(),
                format_value(row.impairments),
                format_value(row.loans),
                format_value(row.npl),
            ])?;
        }
        let data = wtr
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        format!("{v}")
    }
}

fn period_dir_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^BA900_(\d{4}-\d{2}-\d{2})_zipcsv$")
            .expect("period directory pattern is valid")
    })
}

/// Date encoded in a `BA900_<YYYY-MM-DD>_zipcsv` name.
///
/// `Ok(None)` for names that do not match the pattern; an error for names that
/// match but are not a real date.
pub fn parse_period_dir(name: &str) -> Result<Option<NaiveDate>, AggregateError> {
    let caps = match period_dir_pattern().captures(name) {
        Some(caps) => caps,
        None => return Ok(None),
    };
    NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d")
        .map(Some)
        .map_err(|_| AggregateError::InvalidDate {
            name: name.to_string(),
        })
}

/// Matched directories that contain the data file, sorted by date.
pub fn scan_period_dirs(
    data_dir: &Path,
    data_file: &str,
) -> Result<Vec<(NaiveDate, PathBuf)>, AggregateError> {
    let read_dir_err = |source| AggregateError::ReadDir {
        path: data_dir.to_path_buf(),
        source,
    };

    let mut found = Vec::new();
    for entry in fs::read_dir(data_dir).map_err(read_dir_err)? {
        let entry = entry.map_err(read_dir_err)?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some(date) = parse_period_dir(name)? else {
            continue;
        };

        let file = entry.path().join(data_file);
        if !file.is_file() {
            tracing::debug!("no {data_file} in {name}, skipping");
            continue;
        }
        found.push((date, file));
    }

    found.sort_by_key(|(date, _)| *date);
    Ok(found)
}

/// Parse a value cell. Surrounding whitespace is ignored and an empty or
/// missing cell is NaN.
fn parse_value(cell: Option<&str>) -> Result<f64, String> {
    let text = cell.unwrap_or("").trim();
    if text.is_empty() {
        return Ok(f64::NAN);
    }
    text.parse::<f64>().map_err(|_| text.to_string())
}

/// Extract both targets from one data file and pivot them into a row.
pub fn observe_file(
    path: &Path,
    date: NaiveDate,
    config: &AggregateConfig,
) -> Result<NplRow, AggregateError> {
    let targets = config.targets();
    let rows = find_target_rows(path, &targets)?;

    let mut values: [Option<f64>; 2] = [None, None];
    for row in &rows {
        let Some(slot) = targets.iter().position(|t| *t == row.label) else {
            continue;
        };
        if values[slot].is_some() {
            return Err(AggregateError::DuplicateObservation {
                path: path.to_path_buf(),
                date,
                label: row.label.clone(),
            });
        }
        let cell = row
            .values
            .get(&config.value_column)
            .ok_or_else(|| AggregateError::MissingValueColumn {
                path: path.to_path_buf(),
                column: config.value_column.clone(),
            })?;
        let value = parse_value(cell).map_err(|value| AggregateError::NotNumeric {
            path: path.to_path_buf(),
            label: row.label.clone(),
            value,
        })?;
        values[slot] = Some(value);
    }

    match values {
        [Some(impairments), Some(loans)] => Ok(NplRow::new(date, impairments, loans)),
        _ => {
            let missing = if values[0].is_none() { 0 } else { 1 };
            Err(AggregateError::MissingTarget {
                path: path.to_path_buf(),
                label: targets[missing].to_string(),
            })
        }
    }
}

/// Scan `data_dir` and build the pivoted NPL table.
pub fn aggregate_totals(
    data_dir: &Path,
    config: &AggregateConfig,
) -> Result<NplTable, AggregateError> {
    let files = scan_period_dirs(data_dir, &config.data_file)?;
    tracing::info!("{} dated extracts under {}", files.len(), data_dir.display());

    let mut by_date: BTreeMap<NaiveDate, NplRow> = BTreeMap::new();
    for (date, path) in files {
        let row = observe_file(&path, date, config)?;
        by_date.insert(date, row);
        tracing::debug!(npl = row.npl, "extracted {date} from {}", path.display());
    }

    let mut table = NplTable::empty(config);
    table.rows = by_date.into_values().collect();
    Ok(table)
}

/// Write the table to `path`, replacing any existing file.
pub fn write_npl_csv(table: &NplTable, path: &Path) -> Result<(), AggregateError> {
    let write_err = |reason: String| AggregateError::Write {
        path: path.to_path_buf(),
        reason,
    };
    let text = table.to_csv().map_err(|e| write_err(e.to_string()))?;
    write_atomic(path, text.as_bytes()).map_err(|e| write_err(e.to_string()))
}

/// Aggregate `data_dir` and write the result to `output`.
///
/// Nothing is written if aggregation fails.
pub fn aggregate_totals_to_csv(
    data_dir: &Path,
    config: &AggregateConfig,
    output: &Path,
) -> Result<NplTable, AggregateError> {
    let table = aggregate_totals(data_dir, config)?;
    write_npl_csv(&table, output)?;
    Ok(table)
}
