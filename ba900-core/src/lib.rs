//! BA900 Core — SARB return download, row extraction, NPL aggregation.
//!
//! Two independent pipelines:
//! - [`fetch`]: list BA900 periods, download the `TOTAL` return for each period
//!   in a date range with exponential-backoff retry, flatten the XML payload,
//!   and write one CSV row per period.
//! - [`aggregate`]: walk `BA900_<date>_zipcsv` extract directories, pull the
//!   impairments and loans rows out of each `TOTAL.csv` via [`extract`], and
//!   derive the NPL ratio per date.

pub mod aggregate;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod output;
pub mod record;

pub use aggregate::{aggregate_totals, aggregate_totals_to_csv, AggregateError, NplRow, NplTable};
pub use config::{AggregateConfig, Ba900Config, ConfigError, FetchConfig};
pub use extract::{find_target_rows, ExtractError, LabeledRow};
pub use record::FieldMap;
