//! Retry with exponential backoff for cached reads.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::api::{ApiError, ApiResult};

/// How failed reads are retried.
///
/// Only errors for which [`ApiError::is_retryable`] holds are retried; a 4xx
/// answer ends the read on the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Retries after the first attempt
  pub max_retries: u32,
  pub base_delay: Duration,
  pub max_delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_retries: 3,
      base_delay: Duration::from_secs(1),
      max_delay: Duration::from_secs(30),
    }
  }
}

impl RetryPolicy {
  /// Never retry.
  pub fn none() -> Self {
    Self {
      max_retries: 0,
      ..Self::default()
    }
  }

  /// Delay before retry number `attempt` (0-based): `min(base * 2^attempt, max)`.
  pub fn delay(&self, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    self.base_delay.saturating_mul(factor).min(self.max_delay)
  }

  pub fn should_retry(&self, failures: u32, error: &ApiError) -> bool {
    error.is_retryable() && failures <= self.max_retries
  }

  /// Run `op` until it succeeds, fails permanently, or retries run out.
  pub async fn run<T, F, Fut>(&self, mut op: F) -> ApiResult<T>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
  {
    let mut failures = 0;
    loop {
      match op().await {
        Ok(value) => return Ok(value),
        Err(e) => {
          failures += 1;
          if !self.should_retry(failures, &e) {
            return Err(e);
          }

          let backoff = self.delay(failures - 1);
          warn!(
            error = %e,
            retry = failures,
            max_retries = self.max_retries,
            backoff_ms = backoff.as_millis() as u64,
            "retrying request"
          );
          tokio::time::sleep(backoff).await;
        }
      }
    }
  }
}
