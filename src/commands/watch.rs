use std::io::Write;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{debug, warn};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::http::{ResilientClient, Transport};
use crate::poll::Poller;

/// Polls an endpoint and prints every changed value as one JSON line.
///
/// Stops after `count` changes when given, or once `stop` fires.
#[tracing::instrument(skip(client, stop, out))]
pub async fn watch<T: Transport, W: Write>(
    client: Arc<ResilientClient<T>>,
    endpoint: &str,
    interval: Duration,
    count: Option<usize>,
    stop: &CancellationToken,
    out: &mut W,
) -> Result<()> {
    let poller = Poller::new(client, endpoint, interval);
    let mut write_error = None;
    let mut printed = 0;

    let changes = poller
        .run(stop, |value: &Value| {
            if let Err(e) = writeln!(out, "{}", value).and_then(|_| out.flush()) {
                write_error = Some(e);
                return ControlFlow::Break(());
            }
            printed += 1;
            match count {
                Some(limit) if printed >= limit => ControlFlow::Break(()),
                _ => ControlFlow::Continue(()),
            }
        })
        .await;

    if let Some(e) = write_error {
        warn!("Stopped watching '{}': {}", endpoint, e);
        return Err(e.into());
    }
    debug!("Watched '{}', {} change(s)", endpoint, changes);
    Ok(())
}
