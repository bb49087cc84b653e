//! Team draft: exclusive claims and the claim board.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use crate::{
    error::SeasonError,
    models::{registry_name, Claimant, Season, TEAM_NAMES},
    repository::SeasonRepository,
};

/// Prefix of the opaque token carried by a claim action.
pub const CLAIM_TOKEN_PREFIX: &str = "team:";

/// Buttons per claim-board row.
pub const BOARD_ROW_WIDTH: usize = 5;

static CLAIM_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^team:(?P<team>.+)$").expect("valid claim token regex"));

/// Token for claiming `team`.
pub fn claim_token(team: &str) -> String {
    format!("{CLAIM_TOKEN_PREFIX}{team}")
}

/// Extract the team name from a claim token.
///
/// Returns `None` for tokens that are not claim actions at all; those are
/// ignored rather than rejected.
pub fn parse_claim_token(token: &str) -> Option<&str> {
    CLAIM_TOKEN_RE
        .captures(token)
        .and_then(|caps| caps.name("team"))
        .map(|team| team.as_str())
}

/// Result of a successful claim.
#[derive(Debug, Clone)]
pub struct ClaimOutcome {
    /// Season after the claim was committed.
    pub season: Season,
    /// Team that was claimed.
    pub team: &'static str,
    /// Every team is owned; further claims should be locked.
    pub all_claimed: bool,
}

impl ClaimOutcome {
    /// Board reflecting the committed season.
    pub fn board(&self) -> ClaimBoard {
        ClaimBoard::from_season(&self.season)
    }
}

/// Apply a claim to an in-memory season.
pub fn apply_claim(
    season: &mut Season,
    team: &str,
    claimant: &Claimant,
) -> Result<&'static str, SeasonError> {
    let name = registry_name(team).ok_or_else(|| SeasonError::UnknownTeam(team.to_string()))?;
    if !season.is_active() {
        return Err(SeasonError::SeasonNotActive);
    }
    season
        .team_mut(name)
        .ok_or_else(|| SeasonError::UnknownTeam(team.to_string()))?
        .assign_owner(name, claimant)?;
    Ok(name)
}

/// Claim `team` for `claimant` and persist the result.
///
/// Runs under the repository writer lock, so two concurrent claims for the
/// same team resolve to one winner and one [`SeasonError::AlreadyClaimed`].
pub async fn claim(
    repo: &SeasonRepository,
    team: &str,
    claimant: &Claimant,
) -> Result<ClaimOutcome, SeasonError> {
    if registry_name(team).is_none() {
        return Err(SeasonError::UnknownTeam(team.to_string()));
    }

    let mut txn = repo.begin().await;
    let mut season = txn.load()?.ok_or(SeasonError::NoSeason)?;
    let name = match apply_claim(&mut season, team, claimant) {
        Ok(name) => name,
        Err(err) => {
            warn!(team, claimant = %claimant.id, %err, "claim rejected");
            return Err(err);
        }
    };
    let season = txn.commit(season)?;
    let all_claimed = season.all_teams_claimed();
    info!(
        season_id = %season.season_id,
        team = name,
        claimant = %claimant.id,
        all_claimed,
        "team claimed"
    );
    Ok(ClaimOutcome {
        season,
        team: name,
        all_claimed,
    })
}

/// One button on the claim board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimButton {
    /// Team label.
    pub team: &'static str,
    /// Token delivered back when the button is pressed.
    pub token: String,
    /// Button can no longer be pressed.
    pub disabled: bool,
}

/// The grid of team buttons posted with the claim prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimBoard {
    /// Buttons grouped in rows of [`BOARD_ROW_WIDTH`], registry order.
    pub rows: Vec<Vec<ClaimButton>>,
    /// Every team is owned and the whole board is disabled.
    pub locked: bool,
}

impl ClaimBoard {
    /// Build the board for the current ownership state.
    pub fn from_season(season: &Season) -> Self {
        let locked = season.all_teams_claimed();
        let rows = TEAM_NAMES
            .chunks(BOARD_ROW_WIDTH)
            .map(|row| {
                row.iter()
                    .map(|&team| ClaimButton {
                        team,
                        token: claim_token(team),
                        disabled: locked
                            || season.team(team).map(|state| state.is_owned()).unwrap_or(false),
                    })
                    .collect()
            })
            .collect();
        Self { rows, locked }
    }

    /// Buttons in registry order.
    pub fn buttons(&self) -> impl Iterator<Item = &ClaimButton> {
        self.rows.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;

    use crate::{
        models::{SeasonStatus, MAX_ROUNDS},
        store::MemorySeasonStore,
    };

    fn repo_with(season: Season) -> SeasonRepository {
        SeasonRepository::new(Arc::new(MemorySeasonStore::with_season(season)))
    }

    #[test]
    fn parses_claim_tokens() {
        assert_eq!(parse_claim_token("team:Aston Martin"), Some("Aston Martin"));
        assert_eq!(parse_claim_token("team:Nobody"), Some("Nobody"));
        assert_eq!(parse_claim_token("vote:Ferrari"), None);
        assert_eq!(parse_claim_token("team:"), None);
        assert_eq!(claim_token("RB"), "team:RB");
    }

    #[tokio::test]
    async fn claim_assigns_owner_and_persists() -> Result<(), SeasonError> {
        let repo = repo_with(Season::new("S1", Utc::now()));
        let outcome = claim(&repo, "Ferrari", &Claimant::new("7", "dana")).await?;
        assert_eq!(outcome.team, "Ferrari");
        assert!(!outcome.all_claimed);

        let stored = repo.snapshot()?.expect("season");
        let ferrari = stored.team("Ferrari").expect("team");
        assert_eq!(ferrari.owner_id.as_deref(), Some("7"));
        assert_eq!(ferrari.owner_name.as_deref(), Some("dana"));
        Ok(())
    }

    #[tokio::test]
    async fn claiming_a_taken_team_leaves_it_unchanged() -> Result<(), SeasonError> {
        let repo = repo_with(Season::new("S1", Utc::now()));
        claim(&repo, "Haas", &Claimant::new("1", "erin")).await?;
        let before = repo.snapshot()?.expect("season");

        let err = claim(&repo, "Haas", &Claimant::new("2", "finn"))
            .await
            .unwrap_err();
        assert!(matches!(err, SeasonError::AlreadyClaimed(ref team) if team == "Haas"));
        assert_eq!(repo.snapshot()?, Some(before));
        Ok(())
    }

    #[tokio::test]
    async fn rejects_unknown_team_and_inactive_season() {
        let repo = repo_with(Season::new("S1", Utc::now()));
        assert!(matches!(
            claim(&repo, "Brawn", &Claimant::new("1", "x")).await,
            Err(SeasonError::UnknownTeam(_))
        ));

        let mut finished = Season::new("S2", Utc::now());
        finished.round = MAX_ROUNDS;
        finished.status = SeasonStatus::Complete;
        let repo = repo_with(finished);
        assert!(matches!(
            claim(&repo, "RB", &Claimant::new("1", "x")).await,
            Err(SeasonError::SeasonNotActive)
        ));

        let empty = SeasonRepository::new(Arc::new(MemorySeasonStore::new()));
        assert!(matches!(
            claim(&empty, "RB", &Claimant::new("1", "x")).await,
            Err(SeasonError::NoSeason)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_for_one_team_have_a_single_winner() -> Result<(), SeasonError> {
        let repo = Arc::new(repo_with(Season::new("S1", Utc::now())));

        let attempts = (0..16).map(|idx| {
            let repo = repo.clone();
            tokio::spawn(async move {
                let claimant = Claimant::new(idx.to_string(), format!("player{idx}"));
                claim(&repo, "McLaren", &claimant).await
            })
        });
        let mut winners = Vec::new();
        let mut rejected = 0;
        for handle in attempts.collect::<Vec<_>>() {
            match handle.await.expect("task joined") {
                Ok(outcome) => winners.push(outcome),
                Err(SeasonError::AlreadyClaimed(_)) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(winners.len(), 1);
        assert_eq!(rejected, 15);

        let stored = repo.snapshot()?.expect("season");
        let owner = stored.team("McLaren").and_then(|team| team.owner_id.clone());
        assert_eq!(owner, winners[0].season.team("McLaren").and_then(|t| t.owner_id.clone()));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_for_different_teams_all_land() -> Result<(), SeasonError> {
        let repo = Arc::new(repo_with(Season::new("S1", Utc::now())));

        let handles: Vec<_> = TEAM_NAMES
            .iter()
            .enumerate()
            .map(|(idx, team)| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    claim(&repo, team, &Claimant::new(idx.to_string(), format!("p{idx}"))).await
                })
            })
            .collect();
        let mut locked = 0;
        for handle in handles {
            if handle.await.expect("task joined")?.all_claimed {
                locked += 1;
            }
        }
        assert_eq!(locked, 1);

        let stored = repo.snapshot()?.expect("season");
        assert!(stored.all_teams_claimed());
        assert_eq!(stored.revision, TEAM_NAMES.len() as u64);
        Ok(())
    }

    #[test]
    fn board_disables_owned_teams_and_locks_when_full() -> Result<(), SeasonError> {
        let mut season = Season::new("S1", Utc::now());
        apply_claim(&mut season, "Alpine", &Claimant::new("1", "gus"))?;

        let board = ClaimBoard::from_season(&season);
        assert_eq!(board.rows.len(), 2);
        assert!(board.rows.iter().all(|row| row.len() == BOARD_ROW_WIDTH));
        assert!(!board.locked);
        let disabled: Vec<_> = board
            .buttons()
            .filter(|button| button.disabled)
            .map(|button| button.team)
            .collect();
        assert_eq!(disabled, vec!["Alpine"]);
        assert_eq!(board.rows[1][0].token, "team:Alpine");

        for (idx, team) in TEAM_NAMES.iter().enumerate() {
            if *team != "Alpine" {
                apply_claim(&mut season, team, &Claimant::new(idx.to_string(), "p"))?;
            }
        }
        let board = ClaimBoard::from_season(&season);
        assert!(board.locked);
        assert!(board.buttons().all(|button| button.disabled));
        Ok(())
    }
}
