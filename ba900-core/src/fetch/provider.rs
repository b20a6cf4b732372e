//! Transport trait, progress reporting, and structured error types.
//!
//! The HttpTransport trait abstracts over the network so the retry loop and
//! the download orchestrator can be driven by scripted responses in tests.

use super::period::ReportingPeriod;
use thiserror::Error;

/// Structured error types for fetch operations.
///
/// Every variant names the URL, period, or path it concerns so the CLI can
/// print it verbatim.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("HTTP {status} from {url} after {attempts} attempts")]
    RetriesExhausted {
        url: String,
        status: u16,
        attempts: u32,
    },

    #[error("unexpected response body from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("invalid reporting period '{0}': expected an ISO date (YYYY-MM-DD)")]
    InvalidPeriod(String),

    #[error("malformed XMLData for period {period}: {reason}")]
    Xml { period: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("failed to write {path}: {reason}")]
    Output { path: String, reason: String },
}

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A blocking GET-only HTTP transport.
///
/// Implementations return `Ok` for any response that arrived, whatever its
/// status; `Err` is reserved for transport failures (connect, timeout, body).
pub trait HttpTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, FetchError>;
}

/// Progress callback for multi-period downloads.
pub trait DownloadProgress {
    /// Called before fetching a period.
    fn on_start(&self, period: &ReportingPeriod, index: usize, total: usize);

    /// Called after a period produced a record with `field_count` fields.
    fn on_complete(&self, period: &ReportingPeriod, field_count: usize);

    /// Called when a period had no XMLData and was skipped.
    fn on_skip(&self, period: &ReportingPeriod);

    /// Called once the whole range has been processed.
    fn on_batch_complete(&self, fetched: usize, skipped: usize, total: usize);
}

/// Progress reporter that logs through `tracing`.
pub struct LogProgress;

impl DownloadProgress for LogProgress {
    fn on_start(&self, period: &ReportingPeriod, index: usize, total: usize) {
        tracing::debug!("[{}/{}] fetching period {period}", index + 1, total);
    }

    fn on_complete(&self, period: &ReportingPeriod, field_count: usize) {
        tracing::info!(fields = field_count, "processed period {period}");
    }

    fn on_skip(&self, period: &ReportingPeriod) {
        tracing::warn!("no XMLData for period {period}, skipping");
    }

    fn on_batch_complete(&self, fetched: usize, skipped: usize, total: usize) {
        tracing::info!("download complete: {fetched}/{total} fetched, {skipped} skipped");
    }
}
