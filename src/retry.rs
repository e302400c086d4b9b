//! Retrying Remote Call Wrapper
//!
//! Every remote call the pipeline makes goes through [`RetryPolicy::run`]: the
//! operation is attempted up to `max_attempts` times, sleeping `base ^ attempt`
//! units between attempts (attempt index starting at 0). After the last attempt
//! fails a single [`ApiError::RetriesExhausted`] is returned carrying the attempt
//! count and the last underlying error. The wrapper never touches persisted state.

use crate::config::GenerationConfig;
use crate::error::ApiError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Bounded exponential-backoff policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: u32,
    pub unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            max_attempts: config.max_api_retries.max(1),
            base: config.retry_delay_base,
            unit: Duration::from_millis(config.retry_unit_ms),
        }
    }

    /// Same policy with a different attempt limit
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Delay after the failed attempt with the given 0-based index
    pub fn backoff(&self, attempt_index: u32) -> Duration {
        let units = self.base.saturating_pow(attempt_index);
        self.unit.saturating_mul(units)
    }

    /// Run `operation` until it succeeds or the attempt limit is reached
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            debug!(call = %label, attempt = attempt + 1, max_attempts, "Remote call attempt");
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(
                        call = %label,
                        attempt = attempt + 1,
                        max_attempts,
                        error = %err,
                        "Remote call failed"
                    );
                    if attempt + 1 >= max_attempts {
                        error!(
                            call = %label,
                            attempts = max_attempts,
                            error = %err,
                            "Remote call failed permanently"
                        );
                        return Err(ApiError::RetriesExhausted {
                            attempts: max_attempts,
                            last_error: err.to_string(),
                        });
                    }
                    let wait = self.backoff(attempt);
                    debug!(call = %label, wait_ms = wait.as_millis() as u64, "Backing off");
                    sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}
