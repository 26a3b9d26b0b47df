//! Retry with exponential backoff for flaky collaborator calls.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::error::{AppError, ScanError};

/// Errors that can tell whether a retry is likely to help sooner rather than later.
pub trait Transient {
    /// Network-class failures wait twice as long before the next attempt.
    fn is_transient(&self) -> bool {
        false
    }

    /// Failures that no retry can fix end the loop at once.
    fn is_retryable(&self) -> bool {
        true
    }
}

impl Transient for ScanError {
    fn is_transient(&self) -> bool {
        ScanError::is_transient(self)
    }

    fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ScanError::InvalidParams(_) | ScanError::InsufficientHistory { .. } | ScanError::Cancelled
        )
    }
}

impl Transient for AppError {
    fn is_transient(&self) -> bool {
        match self {
            AppError::Scan(e) => e.is_transient(),
            AppError::Reqwest(_) => true,
            _ => false,
        }
    }

    fn is_retryable(&self) -> bool {
        !matches!(self, AppError::NotFound(_) | AppError::BadRequest(_))
    }
}

/// Backoff configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay in milliseconds (doubles with each retry).
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 1000,
            max_backoff_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Calculate backoff delay for a given attempt.
    pub fn backoff_delay(&self, attempt: u32, transient: bool) -> Duration {
        let factor = if transient { 2 } else { 1 };
        let delay_ms = self
            .base_delay_ms
            .saturating_mul(factor)
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(self.max_backoff_ms);
        Duration::from_millis(delay_ms)
    }

    /// Run `op` until it succeeds or the retries are spent, returning the last error.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + Display,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(op = label, attempt = attempt + 1, "Recovered after retries");
                    }
                    return Ok(value);
                }
                Err(e) if attempt < self.max_retries && e.is_retryable() => {
                    let delay = self.backoff_delay(attempt, e.is_transient());
                    tracing::warn!(
                        op = label,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Call failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
