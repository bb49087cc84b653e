//! Weekend simulation and scoring.

use rand::{seq::SliceRandom, Rng};
use tracing::info;

use crate::{
    error::SeasonError,
    models::{Season, SeasonStatus, WeekendResult, MAX_ROUNDS, MONEY_PER_POINT, POINTS_TABLE},
    repository::SeasonRepository,
};

/// Points and money one team earned in a weekend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Award {
    /// Scoring team.
    pub team: String,
    /// Points gained this weekend.
    pub points: u32,
    /// Money gained this weekend.
    pub money: u64,
}

/// Committed result of [`run_weekend`].
#[derive(Debug, Clone)]
pub struct WeekendOutcome {
    /// The recorded weekend.
    pub result: WeekendResult,
    /// Awards in race order.
    pub awards: Vec<Award>,
    /// Season after the weekend was committed.
    pub season: Season,
}

impl WeekendOutcome {
    /// The weekend closed out the season.
    pub fn season_complete(&self) -> bool {
        self.season.status == SeasonStatus::Complete
    }
}

/// Points for a 0-based race position; positions past the table score nothing.
pub fn points_for_position(position: usize) -> u32 {
    POINTS_TABLE.get(position).copied().unwrap_or(0)
}

/// Draw an unbiased random permutation of `teams`.
fn shuffled<R: Rng + ?Sized>(teams: &[String], rng: &mut R) -> Vec<String> {
    let mut order = teams.to_vec();
    order.shuffle(rng);
    order
}

/// Check that a weekend may run on `season`.
pub fn ensure_can_race(season: &Season) -> Result<(), SeasonError> {
    match season.status {
        SeasonStatus::Complete => Err(SeasonError::SeasonComplete(season.season_id.clone())),
        SeasonStatus::Active if season.round >= MAX_ROUNDS => {
            Err(SeasonError::SeasonComplete(season.season_id.clone()))
        }
        SeasonStatus::Active if season.owned_teams().is_empty() => {
            Err(SeasonError::NoTeamsSelected)
        }
        SeasonStatus::Active => Ok(()),
    }
}

/// Score `race` into `season`, returning what each team earned.
pub fn apply_race(season: &mut Season, race: &[String]) -> Vec<Award> {
    let mut awards = Vec::with_capacity(race.len().min(POINTS_TABLE.len()));
    for (position, team) in race.iter().enumerate() {
        let points = points_for_position(position);
        if points == 0 {
            continue;
        }
        if let Some(state) = season.team_mut(team) {
            state.award(points);
            awards.push(Award {
                team: team.clone(),
                points,
                money: u64::from(points) * MONEY_PER_POINT,
            });
        }
    }
    awards
}

/// Record a finished weekend: bump the round, append history, close the season at the cap.
fn close_round(season: &mut Season, qualifying: Vec<String>, race: Vec<String>) -> WeekendResult {
    season.round += 1;
    let result = WeekendResult {
        round: season.round,
        qualifying,
        race,
    };
    season.history.push(result.clone());
    if season.round == MAX_ROUNDS {
        season.status = SeasonStatus::Complete;
    }
    result
}

/// Simulate one weekend on an in-memory season.
///
/// Qualifying and race are two independent shuffles of the owned teams.
/// Qualifying is recorded but has no influence on race order or scoring.
pub fn simulate_weekend<R: Rng + ?Sized>(
    season: &mut Season,
    rng: &mut R,
) -> Result<(WeekendResult, Vec<Award>), SeasonError> {
    ensure_can_race(season)?;
    let owned = season.owned_teams();
    let qualifying = shuffled(&owned, rng);
    let race = shuffled(&owned, rng);
    let awards = apply_race(season, &race);
    let result = close_round(season, qualifying, race);
    Ok((result, awards))
}

/// Run the next weekend of the active season and persist it.
pub async fn run_weekend<R: Rng + ?Sized>(
    repo: &SeasonRepository,
    rng: &mut R,
) -> Result<WeekendOutcome, SeasonError> {
    let mut txn = repo.begin().await;
    let mut season = txn.load()?.ok_or(SeasonError::NoSeason)?;
    let (result, awards) = simulate_weekend(&mut season, rng)?;
    let season = txn.commit(season)?;
    info!(
        season_id = %season.season_id,
        round = result.round,
        winner = result.race.first().map(String::as_str).unwrap_or("-"),
        complete = season.status == SeasonStatus::Complete,
        "weekend simulated"
    );
    Ok(WeekendOutcome {
        result,
        awards,
        season,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::BTreeSet, sync::Arc};

    use chrono::Utc;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use crate::{
        models::{Claimant, TEAM_NAMES},
        store::MemorySeasonStore,
    };

    fn season_with_owners(teams: &[&str]) -> Season {
        let mut season = Season::new("STEST", Utc::now());
        for (idx, team) in teams.iter().enumerate() {
            crate::draft::apply_claim(&mut season, team, &Claimant::new(idx.to_string(), "p"))
                .expect("claim");
        }
        season
    }

    fn names(teams: &[&str]) -> Vec<String> {
        teams.iter().map(|team| team.to_string()).collect()
    }

    #[test]
    fn scores_race_order_with_points_table() {
        let mut season = season_with_owners(&["Ferrari", "Mercedes", "McLaren"]);
        let awards = apply_race(&mut season, &names(&["Mercedes", "McLaren", "Ferrari"]));
        let result = close_round(&mut season, names(&["Ferrari", "McLaren", "Mercedes"]), names(&["Mercedes", "McLaren", "Ferrari"]));

        assert_eq!(result.round, 1);
        assert_eq!(season.round, 1);
        let expect = [("Mercedes", 25, 250_000), ("McLaren", 18, 180_000), ("Ferrari", 15, 150_000)];
        for (award, (team, points, money)) in awards.iter().zip(expect) {
            assert_eq!(award.team, team);
            assert_eq!(award.points, points);
            assert_eq!(award.money, money);
            let state = season.team(team).expect("team");
            assert_eq!(state.points, points);
            assert_eq!(state.money, money);
        }
        assert_eq!(season.history, vec![result]);
    }

    #[test]
    fn positions_beyond_table_score_nothing() {
        assert_eq!(points_for_position(0), 25);
        assert_eq!(points_for_position(9), 1);
        assert_eq!(points_for_position(10), 0);
    }

    #[test]
    fn orders_are_permutations_of_owned_teams() {
        let owned = ["Red Bull", "Haas", "Sauber", "Williams"];
        let mut season = season_with_owners(&owned);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let expected: BTreeSet<String> = names(&owned).into_iter().collect();

        for _ in 0..MAX_ROUNDS {
            let (result, awards) = simulate_weekend(&mut season, &mut rng).expect("weekend");
            for order in [&result.qualifying, &result.race] {
                assert_eq!(order.len(), owned.len());
                let seen: BTreeSet<String> = order.iter().cloned().collect();
                assert_eq!(seen, expected);
            }
            for (award, team) in awards.iter().zip(&result.race) {
                assert_eq!(&award.team, team);
            }
        }
        for (_, state) in season.teams_in_order() {
            assert_eq!(state.money, u64::from(state.points) * MONEY_PER_POINT);
        }
        let total: u32 = season.teams.values().map(|state| state.points).sum();
        assert_eq!(total, MAX_ROUNDS * (25 + 18 + 15 + 12));
    }

    #[test]
    fn qualifying_and_race_are_drawn_independently() {
        let mut season = season_with_owners(&TEAM_NAMES);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut differing = 0;
        for _ in 0..MAX_ROUNDS {
            let (result, _) = simulate_weekend(&mut season, &mut rng).expect("weekend");
            if result.qualifying != result.race {
                differing += 1;
            }
        }
        assert!(differing > 0);
    }

    #[test]
    fn weekend_without_owners_changes_nothing() {
        let mut season = Season::new("SEMPTY", Utc::now());
        let before = season.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(matches!(
            simulate_weekend(&mut season, &mut rng),
            Err(SeasonError::NoTeamsSelected)
        ));
        assert_eq!(season, before);
    }

    #[tokio::test]
    async fn tenth_weekend_completes_the_season() -> Result<(), SeasonError> {
        let store = Arc::new(MemorySeasonStore::with_season(season_with_owners(&["RB"])));
        let repo = SeasonRepository::new(store);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        for round in 1..=MAX_ROUNDS {
            let outcome = run_weekend(&repo, &mut rng).await?;
            assert_eq!(outcome.result.round, round);
            assert_eq!(outcome.season.round, round);
            assert_eq!(outcome.season_complete(), round == MAX_ROUNDS);
        }

        let err = run_weekend(&repo, &mut rng).await.unwrap_err();
        assert!(matches!(err, SeasonError::SeasonComplete(ref id) if id == "STEST"));

        let season = repo.snapshot()?.expect("season");
        assert_eq!(season.round, MAX_ROUNDS);
        assert_eq!(season.status, SeasonStatus::Complete);
        assert_eq!(season.history.len(), MAX_ROUNDS as usize);
        let rb = season.team("RB").expect("team");
        assert_eq!(rb.points, 25 * MAX_ROUNDS);
        Ok(())
    }

    #[tokio::test]
    async fn failed_persist_keeps_round_and_history() -> Result<(), SeasonError> {
        let store = Arc::new(MemorySeasonStore::with_season(season_with_owners(&["Alpine"])));
        let repo = SeasonRepository::new(store.clone());
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        store.set_fail_writes(true);
        assert!(run_weekend(&repo, &mut rng).await.is_err());
        let season = repo.snapshot()?.expect("season");
        assert_eq!(season.round, 0);
        assert!(season.history.is_empty());
        assert_eq!(season.team("Alpine").map(|team| team.points), Some(0));
        Ok(())
    }
}
