//! Response shapes of the RoboRegistry API and the team lookup service.

use serde::{Deserialize, Serialize};

/// One tile on the user's dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardTile {
    pub text: String,
    pub path: String,
}

/// Whether the server's clock currently allows registration and check-in.
///
/// Missing fields read as `false`, so the empty timeout object means
/// "closed".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoOpenStatus {
    pub can_register: bool,
    pub can_checkin: bool,
}

/// Switches the event owner controls, independent of the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventFlags {
    pub visible: bool,
    pub registration_enabled: bool,
    pub checkin_enabled: bool,
}

impl Default for EventFlags {
    fn default() -> Self {
        Self {
            visible: true,
            registration_enabled: true,
            checkin_enabled: true,
        }
    }
}

/// What the management page shows for an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistrationState {
    pub registration_open: bool,
    pub checkin_open: bool,
}

impl RegistrationState {
    pub fn combine(status: AutoOpenStatus, flags: EventFlags) -> Self {
        if !flags.visible {
            return Self::default();
        }
        Self {
            registration_open: status.can_register && flags.registration_enabled,
            checkin_open: status.can_checkin && flags.checkin_enabled,
        }
    }
}

/// A team as reported by the FIRST team search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamRecord {
    pub nickname: Option<String>,
    pub orgs: Option<String>,
    pub program: Option<String>,
    pub location: Option<String>,
    pub rookie_year: Option<u32>,
}

/// Result of a team number lookup. Several programs can share a number,
/// hence the list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamLookup {
    pub valid: bool,
    pub season: Option<String>,
    pub data: Vec<TeamRecord>,
}

/// How a registration form should prefill the team name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeamSuggestion {
    /// Unknown number or no answer in time; the user types the name.
    Unknown,
    /// Exactly one match (or none listed); prefill with this name.
    Single(String),
    /// Several teams share the number; the user picks one.
    Choice(Vec<String>),
}

impl TeamLookup {
    pub fn suggestion(&self) -> TeamSuggestion {
        if !self.valid {
            return TeamSuggestion::Unknown;
        }
        let mut nicknames = self
            .data
            .iter()
            .map(|team| team.nickname.clone().unwrap_or_default());
        if self.data.len() > 1 {
            TeamSuggestion::Choice(nicknames.collect())
        } else {
            TeamSuggestion::Single(nicknames.next().unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_auto_open_from_empty_object() {
        let status: AutoOpenStatus = serde_json::from_value(json!({})).unwrap();
        assert_eq!(status, AutoOpenStatus::default());
    }

    #[test]
    fn test_registration_state_hidden_event_is_closed() {
        let status = AutoOpenStatus {
            can_register: true,
            can_checkin: true,
        };
        let flags = EventFlags {
            visible: false,
            ..Default::default()
        };
        assert_eq!(
            RegistrationState::combine(status, flags),
            RegistrationState::default()
        );
    }

    #[test]
    fn test_registration_state_needs_server_and_owner() {
        let status = AutoOpenStatus {
            can_register: true,
            can_checkin: true,
        };
        let flags = EventFlags {
            checkin_enabled: false,
            ..Default::default()
        };
        let state = RegistrationState::combine(status, flags);
        assert!(state.registration_open);
        assert!(!state.checkin_open);

        let status = AutoOpenStatus {
            can_register: false,
            can_checkin: true,
        };
        let state = RegistrationState::combine(status, EventFlags::default());
        assert!(!state.registration_open);
        assert!(state.checkin_open);
    }

    #[test]
    fn test_team_lookup_decodes_search_result() {
        let lookup: TeamLookup = serde_json::from_value(json!({
            "valid": true,
            "season": "2023-2024",
            "data": [{
                "nickname": "Cheesy Poofs",
                "orgs": "Bellarmine College Preparatory",
                "program": "FRC",
                "location": "San Jose, CA, USA",
                "rookie_year": 2010
            }]
        }))
        .unwrap();

        assert!(lookup.valid);
        assert_eq!(lookup.data[0].rookie_year, Some(2010));
        assert_eq!(
            lookup.suggestion(),
            TeamSuggestion::Single("Cheesy Poofs".to_string())
        );
    }

    #[test]
    fn test_team_lookup_empty_object_is_unknown() {
        let lookup: TeamLookup = serde_json::from_value(json!({})).unwrap();
        assert!(!lookup.valid);
        assert_eq!(lookup.suggestion(), TeamSuggestion::Unknown);
    }

    #[test]
    fn test_team_lookup_multiple_programs() {
        let lookup = TeamLookup {
            valid: true,
            season: None,
            data: vec![
                TeamRecord {
                    nickname: Some("Robo Lions".to_string()),
                    ..Default::default()
                },
                TeamRecord::default(),
            ],
        };
        assert_eq!(
            lookup.suggestion(),
            TeamSuggestion::Choice(vec!["Robo Lions".to_string(), String::new()])
        );
    }

    #[test]
    fn test_team_lookup_valid_without_data() {
        let lookup = TeamLookup {
            valid: true,
            ..Default::default()
        };
        assert_eq!(lookup.suggestion(), TeamSuggestion::Single(String::new()));
    }
}
