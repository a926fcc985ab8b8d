//! Retry policy for network operations and failure classification.

use std::time::Duration;

/// Overall wall-clock ceiling for a single fetch, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

/// Delay between retry attempts in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// Failures a single fetch attempt can run into.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request belonged to a cancellation token that has since been aborted.
    #[error("request was cancelled")]
    Cancelled,

    /// The request could not be sent or its body could not be read.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// Transport failure reported by a non-reqwest transport.
    #[error("transport failure: {0}")]
    Other(String),

    /// The body arrived but was not valid JSON for the expected shape.
    #[error("could not decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// What the retry loop should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Wait for the backoff delay and try the same request again.
    Retry,
    /// Stop quietly; nobody is waiting for this result anymore.
    Abandon,
}

/// Classifies a failed attempt.
///
/// Only cancellation stops the loop. Every transport and decode failure is
/// retried; the overall timeout is what bounds the loop.
pub fn classify(error: &FetchError) -> Disposition {
    match error {
        FetchError::Cancelled => Disposition::Abandon,
        FetchError::Transport(_) | FetchError::Other(_) | FetchError::Decode(_) => {
            Disposition::Retry
        }
    }
}

/// Timing policy applied to every fetch.
///
/// There is deliberately no attempt counter: a fetch retries until it
/// succeeds or `timeout` elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(timeout: Duration, retry_delay: Duration) -> Self {
        Self {
            timeout,
            retry_delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}
