//! Download orchestrator: list, filter, fetch each period, write one CSV.

use super::period::{select_range, ReportingPeriod};
use super::provider::{DownloadProgress, FetchError};
use super::sarb::{RawRecord, SarbClient, PERIOD_FIELD};
use crate::output::write_atomic;
use chrono::NaiveDate;
use std::path::Path;

/// Outcome of a range download.
#[derive(Debug, Default)]
pub struct DownloadSummary {
    /// Records sorted ascending by period.
    pub records: Vec<RawRecord>,
    /// Periods whose envelope had no XMLData.
    pub skipped: Vec<ReportingPeriod>,
}

impl DownloadSummary {
    pub fn total(&self) -> usize {
        self.records.len() + self.skipped.len()
    }
}

/// Fetch the TOTAL return for every period in `[start, end]`, one at a time.
///
/// Any fetch error aborts the whole range; only empty payloads are skipped.
pub fn download_range(
    client: &SarbClient,
    start: NaiveDate,
    end: NaiveDate,
    progress: &dyn DownloadProgress,
) -> Result<DownloadSummary, FetchError> {
    let periods = select_range(client.list_available_periods()?, start, end);
    let total = periods.len();
    tracing::info!("{total} BA900 periods between {start} and {end}");

    let mut summary = DownloadSummary::default();
    for (i, period) in periods.into_iter().enumerate() {
        progress.on_start(&period, i, total);
        match client.fetch_period_total(&period)? {
            Some(record) => {
                progress.on_complete(&period, record.fields.len());
                summary.records.push(record);
            }
            None => {
                progress.on_skip(&period);
                summary.skipped.push(period);
            }
        }
    }

    summary.records.sort_by(|a, b| a.period.cmp(&b.period));
    progress.on_batch_complete(summary.records.len(), summary.skipped.len(), total);
    Ok(summary)
}

/// Column order for a set of records: keys in order of first appearance,
/// with `Period` guaranteed present.
pub fn record_columns(records: &[RawRecord]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.fields.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.to_string());
            }
        }
    }
    if !columns.iter().any(|c| c == PERIOD_FIELD) {
        columns.push(PERIOD_FIELD.to_string());
    }
    columns
}

/// Render records as CSV text. Missing fields and fields without text are empty cells.
pub fn records_to_csv(records: &[RawRecord]) -> Result<String, csv::Error> {
    let columns = record_columns(records);
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(&columns)?;
    for record in records {
        wtr.write_record(
            columns
                .iter()
                .map(|c| record.fields.text(c).unwrap_or("")),
        )?;
    }
    let data = wtr
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

/// Write the records to `path`, replacing any existing file.
pub fn write_records_csv(records: &[RawRecord], path: &Path) -> Result<(), FetchError> {
    let output_err = |reason: String| FetchError::Output {
        path: path.display().to_string(),
        reason,
    };
    let text = records_to_csv(records).map_err(|e| output_err(e.to_string()))?;
    write_atomic(path, text.as_bytes()).map_err(|e| output_err(e.to_string()))
}
