use std::io::Write;

use anyhow::Result;
use log::debug;

use crate::http::Transport;
use crate::registry::RegistryApi;

/// Prints the dashboard tiles as `text -> path`.
#[tracing::instrument(skip(api, out))]
pub async fn dashboard<T: Transport, W: Write>(api: &RegistryApi<T>, out: &mut W) -> Result<()> {
    let tiles = api.dashboard().await;
    if tiles.is_empty() {
        writeln!(out, "No dashboard entries.")?;
        return Ok(());
    }

    debug!("Found {} dashboard tile(s)", tiles.len());
    for tile in tiles {
        writeln!(out, "{} -> {}", tile.text, tile.path)?;
    }
    Ok(())
}
