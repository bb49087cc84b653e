//! Shared domain models.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SeasonError;

/// Fixed team registry. Registry order is the tie-break order everywhere.
pub const TEAM_NAMES: [&str; 10] = [
    "Red Bull",
    "Ferrari",
    "Mercedes",
    "McLaren",
    "Aston Martin",
    "Alpine",
    "Williams",
    "Haas",
    "RB",
    "Sauber",
];

/// Number of weekends in a season.
pub const MAX_ROUNDS: u32 = 10;

/// Points awarded by race finishing position.
pub const POINTS_TABLE: [u32; 10] = [25, 18, 15, 12, 10, 8, 6, 4, 2, 1];

/// Currency awarded per championship point.
pub const MONEY_PER_POINT: u64 = 10_000;

/// Returns the canonical registry name when `name` is a known team.
pub fn registry_name(name: &str) -> Option<&'static str> {
    TEAM_NAMES.iter().copied().find(|team| *team == name)
}

/// Lifecycle state of a season. Only ever moves from `Active` to `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonStatus {
    /// Claims and weekends are accepted.
    Active,
    /// All rounds have been simulated; the season is read-only.
    Complete,
}

/// Identity of a participant claiming a team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claimant {
    /// Platform-level identifier; not validated further.
    pub id: String,
    /// Display name shown in standings.
    pub name: String,
}

impl Claimant {
    /// Build a claimant from an identifier and display name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Per-team state inside a season.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamState {
    /// Identifier of the owning participant, written at most once.
    pub owner_id: Option<String>,
    /// Display name of the owning participant.
    pub owner_name: Option<String>,
    /// Accumulated championship points.
    pub points: u32,
    /// Accumulated prize money, always `points * MONEY_PER_POINT`.
    pub money: u64,
}

impl TeamState {
    /// Whether a participant owns this team.
    pub fn is_owned(&self) -> bool {
        self.owner_id.is_some()
    }

    /// Add points, keeping money in lockstep.
    pub fn award(&mut self, points: u32) {
        self.points += points;
        self.money = u64::from(self.points) * MONEY_PER_POINT;
    }

    pub(crate) fn assign_owner(&mut self, team: &str, claimant: &Claimant) -> Result<(), SeasonError> {
        if self.is_owned() {
            return Err(SeasonError::AlreadyClaimed(team.to_string()));
        }
        self.owner_id = Some(claimant.id.clone());
        self.owner_name = Some(claimant.name.clone());
        Ok(())
    }
}

/// Outcome of a single simulated weekend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekendResult {
    /// Round number this weekend completed (1-based).
    pub round: u32,
    /// Qualifying order. Informational only; never feeds scoring.
    pub qualifying: Vec<String>,
    /// Race finishing order used for scoring.
    pub race: Vec<String>,
}

/// The whole persisted competition state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    /// Opaque identifier generated at creation.
    pub season_id: String,
    /// Lifecycle state.
    pub status: SeasonStatus,
    /// Number of weekends simulated so far.
    pub round: u32,
    /// Team registry state keyed by team name.
    pub teams: BTreeMap<String, TeamState>,
    /// One entry per simulated weekend, append-only.
    #[serde(default)]
    pub history: Vec<WeekendResult>,
    /// Write sequence number, bumped on every committed save.
    #[serde(default)]
    pub revision: u64,
    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Season {
    /// Build a fresh active season with every team unowned.
    pub fn new(season_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        let teams = TEAM_NAMES
            .iter()
            .map(|team| (team.to_string(), TeamState::default()))
            .collect();
        Self {
            season_id: season_id.into(),
            status: SeasonStatus::Active,
            round: 0,
            teams,
            history: Vec::new(),
            revision: 0,
            created_at: Some(created_at),
        }
    }

    /// Whether claims and weekends are still accepted.
    pub fn is_active(&self) -> bool {
        self.status == SeasonStatus::Active
    }

    /// Look up a team's state.
    pub fn team(&self, name: &str) -> Option<&TeamState> {
        self.teams.get(name)
    }

    pub(crate) fn team_mut(&mut self, name: &str) -> Option<&mut TeamState> {
        self.teams.get_mut(name)
    }

    /// Teams in registry order.
    pub fn teams_in_order(&self) -> impl Iterator<Item = (&'static str, &TeamState)> + '_ {
        TEAM_NAMES
            .iter()
            .filter_map(move |name| self.teams.get(*name).map(|state| (*name, state)))
    }

    /// Names of currently owned teams, in registry order.
    pub fn owned_teams(&self) -> Vec<String> {
        self.teams_in_order()
            .filter(|(_, state)| state.is_owned())
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// True once every team in the registry has an owner.
    pub fn all_teams_claimed(&self) -> bool {
        self.teams.values().all(TeamState::is_owned)
    }

    /// Most recent weekend, if any.
    pub fn last_weekend(&self) -> Option<&WeekendResult> {
        self.history.last()
    }

    /// Check the structural invariants of a loaded record.
    pub fn validate(&self) -> Result<(), SeasonError> {
        let expected: BTreeSet<&str> = TEAM_NAMES.iter().copied().collect();
        let actual: BTreeSet<&str> = self.teams.keys().map(String::as_str).collect();
        if expected != actual {
            return Err(SeasonError::CorruptRecord(
                "team set does not match the registry".to_string(),
            ));
        }
        if self.round > MAX_ROUNDS {
            return Err(SeasonError::CorruptRecord(format!(
                "round {} exceeds {MAX_ROUNDS}",
                self.round
            )));
        }
        if self.status == SeasonStatus::Complete && self.round != MAX_ROUNDS {
            return Err(SeasonError::CorruptRecord(format!(
                "complete season stopped at round {}",
                self.round
            )));
        }
        if self.history.len() != self.round as usize {
            return Err(SeasonError::CorruptRecord(format!(
                "{} weekends recorded for round {}",
                self.history.len(),
                self.round
            )));
        }
        if let Some((idx, weekend)) = self
            .history
            .iter()
            .enumerate()
            .find(|(idx, weekend)| weekend.round as usize != idx + 1)
        {
            return Err(SeasonError::CorruptRecord(format!(
                "history entry {} is labelled round {}",
                idx + 1,
                weekend.round
            )));
        }
        if let Some((name, _)) = self
            .teams
            .iter()
            .find(|(_, state)| state.money != u64::from(state.points) * MONEY_PER_POINT)
        {
            return Err(SeasonError::CorruptRecord(format!(
                "money out of step with points for {name}"
            )));
        }
        if let Some((name, _)) = self
            .teams
            .iter()
            .find(|(_, state)| state.owner_id.is_some() != state.owner_name.is_some())
        {
            return Err(SeasonError::CorruptRecord(format!(
                "owner id and name disagree for {name}"
            )));
        }
        Ok(())
    }
}
