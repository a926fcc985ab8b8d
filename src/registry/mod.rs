//! Typed access to the RoboRegistry API.
//!
//! Every call goes through the shared [`ResilientClient`], so the usual
//! contract holds: nothing here returns an error for a network problem. A
//! timed-out request reads as "no data" (empty dashboard, closed event,
//! unknown team).

mod team;
mod types;

use std::sync::Arc;

use log::debug;
use serde_json::Value;

use crate::http::{FetchOutcome, ReqwestTransport, ResilientClient, Transport};

pub use team::TeamNumber;
pub use types::{
    AutoOpenStatus, DashboardTile, EventFlags, RegistrationState, TeamLookup, TeamRecord,
    TeamSuggestion,
};

pub struct RegistryApi<T: Transport = ReqwestTransport> {
    client: Arc<ResilientClient<T>>,
}

impl<T: Transport> RegistryApi<T> {
    pub fn new(client: Arc<ResilientClient<T>>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<ResilientClient<T>> {
        &self.client
    }

    #[tracing::instrument(skip(self))]
    pub async fn dashboard(&self) -> Vec<DashboardTile> {
        self.client
            .fetch("/api/dashboard")
            .await
            .data()
            .unwrap_or_default()
    }

    #[tracing::instrument(skip(self))]
    pub async fn auto_open(&self, event_uid: &str) -> AutoOpenStatus {
        self.client
            .fetch(&format!("/api/is_auto_open/{}", event_uid))
            .await
            .data()
            .unwrap_or_default()
    }

    /// Combines the server's clock-based status with the owner's switches.
    /// A hidden event is closed without asking the server.
    pub async fn registration_state(&self, event_uid: &str, flags: EventFlags) -> RegistrationState {
        if !flags.visible {
            debug!("Event {} is hidden, treating it as closed", event_uid);
            return RegistrationState::default();
        }
        let status = self.auto_open(event_uid).await;
        RegistrationState::combine(status, flags)
    }

    pub async fn registrations(&self, event_uid: &str) -> FetchOutcome<Value> {
        self.client
            .fetch_json(&format!("/api/registrations/{}", event_uid))
            .await
    }

    /// Looks up a team number.
    ///
    /// Returns `None` only when the lookup was abandoned through
    /// [`RegistryApi::abandon_pending_lookups`]. Timeouts and answers that
    /// don't look like a lookup result come back as an invalid lookup.
    #[tracing::instrument(skip(self))]
    pub async fn lookup_team(&self, team: TeamNumber) -> Option<TeamLookup> {
        let value = self.client.fetch_team_data(team).await.into_json()?;
        match serde_json::from_value(value) {
            Ok(lookup) => Some(lookup),
            Err(e) => {
                debug!("Unexpected team lookup response for {}: {}", team, e);
                Some(TeamLookup::default())
            }
        }
    }

    /// Drops whatever lookup is still in flight, e.g. because the user
    /// removed the team from the form before the answer came back.
    pub fn abandon_pending_lookups(&self) {
        self.client.abort_current_request();
    }
}
