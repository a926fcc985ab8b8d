use std::io::Write;

use anyhow::{Result, bail};

use crate::http::Transport;
use crate::registry::{RegistryApi, TeamNumber, TeamSuggestion};

/// Looks up a team number and prints what a registration form would prefill.
#[tracing::instrument(skip(api, out))]
pub async fn team<T: Transport, W: Write>(
    api: &RegistryApi<T>,
    number: &str,
    out: &mut W,
) -> Result<()> {
    let team: TeamNumber = number.parse()?;
    let Some(lookup) = api.lookup_team(team).await else {
        bail!("Lookup of team {} was cancelled", team);
    };

    match lookup.suggestion() {
        TeamSuggestion::Unknown => {
            writeln!(out, "Team {}: not found, enter the team name manually", team)?;
        }
        TeamSuggestion::Single(name) if name.is_empty() => {
            writeln!(out, "Team {}: no name on record", team)?;
        }
        TeamSuggestion::Single(name) => {
            writeln!(out, "Team {}: {}", team, name)?;
        }
        TeamSuggestion::Choice(names) => {
            writeln!(out, "Team {}: several teams share this number", team)?;
            for name in names {
                writeln!(out, "  - {}", name)?;
            }
        }
    }

    if let Some(season) = lookup.season.as_deref().filter(|_| lookup.valid) {
        writeln!(out, "Season: {}", season)?;
    }
    Ok(())
}
