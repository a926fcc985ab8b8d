use std::io::Write;

use anyhow::Result;

use crate::http::Transport;
use crate::registry::{EventFlags, RegistryApi};

fn open_or_closed(open: bool) -> &'static str {
    if open { "open." } else { "closed." }
}

/// Prints whether registration and check-in are currently open for an event.
#[tracing::instrument(skip(api, out))]
pub async fn status<T: Transport, W: Write>(
    api: &RegistryApi<T>,
    event_uid: &str,
    flags: EventFlags,
    out: &mut W,
) -> Result<()> {
    let state = api.registration_state(event_uid, flags).await;
    writeln!(out, "Registration: {}", open_or_closed(state.registration_open))?;
    writeln!(out, "Check-in: {}", open_or_closed(state.checkin_open))?;
    Ok(())
}
