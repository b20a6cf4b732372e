//! BA900 period fetcher: SARB API client, retry, XML flattening, CSV output.

pub mod download;
pub mod period;
pub mod provider;
pub mod retry;
pub mod sarb;
pub mod xml;

pub use download::{download_range, records_to_csv, write_records_csv, DownloadSummary};
pub use period::ReportingPeriod;
pub use provider::{DownloadProgress, FetchError, HttpResponse, HttpTransport, LogProgress};
pub use retry::{RetryPolicy, Sleeper, ThreadSleeper};
pub use sarb::{RawRecord, SarbClient};
