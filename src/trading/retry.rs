//! Retry policy for a single provider or broadcast call
//!
//! Transient errors (see [`Error::is_retryable`]) are retried against the same
//! target with exponential backoff and no jitter, up to `max_retries` extra
//! attempts. Terminal errors return immediately.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backoff::{future::retry_notify, ExponentialBackoff};
use tracing::warn;

use crate::config::{RetryConfig, SubmissionConfig};
use crate::error::{Error, Result};

/// Upper bound for a single backoff delay
const MAX_DELAY: Duration = Duration::from_secs(3600);

/// How a failed call should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retry against the same target
    Transient,
    /// Give up on this target
    Terminal,
}

/// Outcome of a retried call
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: Result<T>,
    /// Calls made, first try included
    pub attempts: u32,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, Duration::from_millis(config.base_delay_ms))
    }

    pub fn for_submission(config: &SubmissionConfig) -> Self {
        Self::new(config.max_retries, Duration::from_millis(config.base_delay_ms))
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn classify(error: &Error) -> ErrorClass {
        if error.is_retryable() {
            ErrorClass::Transient
        } else {
            ErrorClass::Terminal
        }
    }

    /// Backoff schedule: base, 2x base, 4x base, ...
    ///
    /// `max_interval` sits above the last delay inside the retry ceiling so
    /// every delay is strictly larger than the previous one.
    pub fn backoff(&self) -> ExponentialBackoff {
        let factor = 2u32.saturating_pow(self.max_retries);
        let max_interval = self.base_delay.checked_mul(factor).unwrap_or(MAX_DELAY);

        ExponentialBackoff {
            current_interval: self.base_delay,
            initial_interval: self.base_delay,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Run `op`, retrying transient failures
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Attempted<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = AtomicU32::new(0);
        let max_retries = self.max_retries;

        let result = retry_notify(
            self.backoff(),
            || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                let call = op();
                async move {
                    call.await.map_err(|e| match Self::classify(&e) {
                        ErrorClass::Transient if attempt <= max_retries => {
                            backoff::Error::transient(e)
                        }
                        _ => backoff::Error::permanent(e),
                    })
                }
            },
            |e: Error, wait: Duration| {
                warn!("{}: transient error, retrying in {:?}: {}", label, wait, e);
            },
        )
        .await;

        Attempted {
            result,
            attempts: attempts.load(Ordering::SeqCst),
        }
    }
}
