//! TOML configuration for the fetcher and the aggregator.
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! stock SARB endpoint and the standard BA900 impairment/loan labels.
//!
//! ```toml
//! [fetch]
//! max_retries = 8
//! backoff_factor = 0.5
//!
//! [aggregate]
//! data_file = "TOTAL.csv"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Base URL of the SARB institution-data API.
pub const DEFAULT_API_BASE: &str = "https://custom.resbank.co.za/SarbWebApi/SarbData/IFData";

pub const DEFAULT_IMPAIRMENTS_LABEL: &str =
    "Less: credit impairments in respect of loans and advances";

pub const DEFAULT_LOANS_LABEL: &str =
    "Overdrafts, loans and advances: private sector (total of items 181, 187 and 188)";

pub const DEFAULT_VALUE_COLUMN: &str = "TOTAL ASSETS (Col 1 plus col 3)";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Ba900Config {
    pub fetch: FetchConfig,
    pub aggregate: AggregateConfig,
}

impl Ba900Config {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fetch.validate()?;
        self.aggregate.validate()
    }
}

/// HTTP and retry settings for the period fetcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    /// API root, without a trailing slash.
    pub api_base: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum attempts per HTTP call (including the first).
    pub max_retries: u32,
    /// Base delay in seconds; attempt `i` waits `backoff_factor * 2^i`.
    pub backoff_factor: f64,
    pub user_agent: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_secs: 10,
            max_retries: 5,
            backoff_factor: 1.0,
            user_agent: None,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base.trim().is_empty() {
            return Err(ConfigError::Invalid("fetch.api_base must not be empty".into()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("fetch.timeout_secs must be > 0".into()));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid("fetch.max_retries must be >= 1".into()));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "fetch.backoff_factor must be a finite non-negative number, got {}",
                self.backoff_factor
            )));
        }
        Ok(())
    }
}

/// Labels and file layout for the impairment/loan aggregation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AggregateConfig {
    /// First-column label of the impairments row (NPL numerator).
    pub impairments_label: String,
    /// First-column label of the loans row (NPL denominator).
    pub loans_label: String,
    /// Header column whose value is pivoted.
    pub value_column: String,
    /// File name looked up inside each matched period directory.
    pub data_file: String,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            impairments_label: DEFAULT_IMPAIRMENTS_LABEL.to_string(),
            loans_label: DEFAULT_LOANS_LABEL.to_string(),
            value_column: DEFAULT_VALUE_COLUMN.to_string(),
            data_file: "TOTAL.csv".to_string(),
        }
    }
}

impl AggregateConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.impairments_label.is_empty() || self.loans_label.is_empty() {
            return Err(ConfigError::Invalid("target labels must not be empty".into()));
        }
        if self.impairments_label == self.loans_label {
            return Err(ConfigError::Invalid(format!(
                "impairments and loans labels must differ (both '{}')",
                self.impairments_label
            )));
        }
        if self.value_column.is_empty() || self.data_file.is_empty() {
            return Err(ConfigError::Invalid(
                "aggregate.value_column and aggregate.data_file must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// The ordered target pair: impairments first, loans second.
    pub fn targets(&self) -> [&str; 2] {
        [self.impairments_label.as_str(), self.loans_label.as_str()]
    }
}
