use std::io::Write;

use anyhow::{Result, bail};

use crate::http::{ResilientClient, Transport};

/// Fetches an endpoint and prints the JSON, or `{}` when it timed out.
#[tracing::instrument(skip(client, out))]
pub async fn fetch<T: Transport, W: Write>(
    client: &ResilientClient<T>,
    endpoint: &str,
    out: &mut W,
) -> Result<()> {
    let Some(value) = client.fetch_json(endpoint).await.into_json() else {
        bail!("Request to '{}' was cancelled", endpoint);
    };
    writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
    Ok(())
}
