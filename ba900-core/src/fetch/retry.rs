//! Exponential-backoff retry around a single GET.
//!
//! Only the statuses in [`RETRYABLE_STATUSES`] are retried. Any other failure
//! status, and any transport error, ends the call immediately.

use super::provider::{FetchError, HttpResponse, HttpTransport};
use crate::config::FetchConfig;
use std::time::Duration;

/// Statuses treated as transient.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

pub fn is_retryable(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// Blocks the calling thread between attempts.
pub trait Sleeper {
    fn sleep(&self, delay: Duration);
}

/// Sleeper backed by `std::thread::sleep`.
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

/// Attempt budget and backoff base for one HTTP call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_factor: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            backoff_factor,
        }
    }

    /// Delay after a retryable status at zero-based `attempt`: `factor * 2^attempt` seconds.
    pub fn delay(&self, attempt: u32) -> Duration {
        let secs = self.backoff_factor * 2f64.powi(attempt as i32);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

impl From<&FetchConfig> for RetryPolicy {
    fn from(config: &FetchConfig) -> Self {
        Self::new(config.max_retries, config.backoff_factor)
    }
}

/// GET `url`, retrying transient statuses with exponential backoff.
///
/// Returns the first successful response. A zero attempt budget still makes
/// one attempt.
pub fn get_with_retry(
    transport: &dyn HttpTransport,
    sleeper: &dyn Sleeper,
    policy: &RetryPolicy,
    url: &str,
) -> Result<HttpResponse, FetchError> {
    let attempts = policy.max_attempts.max(1);

    for attempt in 0..attempts {
        let resp = transport.get(url)?;

        if resp.is_success() {
            return Ok(resp);
        }

        if !is_retryable(resp.status) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: resp.status,
            });
        }

        if attempt + 1 == attempts {
            return Err(FetchError::RetriesExhausted {
                url: url.to_string(),
                status: resp.status,
                attempts,
            });
        }

        let delay = policy.delay(attempt);
        tracing::debug!(
            status = resp.status,
            attempt = attempt + 1,
            "transient response from {url}, retrying in {delay:?}"
        );
        sleeper.sleep(delay);
    }

    unreachable!("retry loop always returns on its final attempt")
}
