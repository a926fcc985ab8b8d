//! Resilient JSON fetching: deadline, retry and single-flight cancellation.

mod client;
mod retry;
mod transport;

pub use client::{DEFAULT_TEAM_API_URL, FetchOutcome, ResilientClient};
pub use retry::{
    DEFAULT_RETRY_DELAY_MS, DEFAULT_TIMEOUT_MS, Disposition, FetchError, RetryPolicy, classify,
};
pub use transport::{ReqwestTransport, Transport};

#[cfg(test)]
pub use transport::MockTransport;
