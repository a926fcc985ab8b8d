//! Periodic re-fetching that only reports data when it actually changed.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use serde::de::DeserializeOwned;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::http::{FetchOutcome, ReqwestTransport, ResilientClient, Transport};

/// Remembers the last value seen and tells whether a new one differs.
#[derive(Debug, Clone)]
pub struct ChangeDetector<T> {
    last: Option<T>,
}

impl<T> Default for ChangeDetector<T> {
    fn default() -> Self {
        Self { last: None }
    }
}

impl<T: PartialEq> ChangeDetector<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value` and returns it if it differs from the previous one.
    /// The first value is always a change.
    pub fn observe(&mut self, value: T) -> Option<&T> {
        if self.last.as_ref() == Some(&value) {
            return None;
        }
        self.last = Some(value);
        self.last.as_ref()
    }

    pub fn last(&self) -> Option<&T> {
        self.last.as_ref()
    }
}

/// Polls one endpoint on a fixed interval.
pub struct Poller<T: Transport = ReqwestTransport> {
    client: Arc<ResilientClient<T>>,
    endpoint: String,
    interval: Duration,
}

impl<T: Transport> Poller<T> {
    pub fn new(client: Arc<ResilientClient<T>>, endpoint: impl Into<String>, interval: Duration) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            interval,
        }
    }

    /// Fetches on every tick and calls `on_change` with each new value.
    ///
    /// Unchanged data is dropped. A poll that times out is skipped rather
    /// than treated as an empty value, so the last good value stays current.
    /// Runs until `stop` fires or `on_change` breaks, and returns how many
    /// changes were reported.
    #[tracing::instrument(skip(self, stop, on_change), fields(endpoint = %self.endpoint))]
    pub async fn run<D, F>(&self, stop: &CancellationToken, mut on_change: F) -> usize
    where
        D: DeserializeOwned + PartialEq + Send,
        F: FnMut(&D) -> ControlFlow<()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut detector = ChangeDetector::new();
        let mut changes = 0;

        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let outcome = tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                outcome = self.client.fetch::<D>(&self.endpoint) => outcome,
            };

            match outcome {
                FetchOutcome::Data(value) => match detector.observe(value) {
                    Some(changed) => {
                        changes += 1;
                        if on_change(changed).is_break() {
                            break;
                        }
                    }
                    None => debug!("'{}' unchanged", self.endpoint),
                },
                FetchOutcome::TimedOut => {
                    debug!("Poll of '{}' timed out, keeping last value", self.endpoint)
                }
                FetchOutcome::Cancelled => debug!("Poll of '{}' was cancelled", self.endpoint),
            }
        }

        changes
    }
}
