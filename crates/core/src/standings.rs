//! Ranked team standings.

use crate::models::{Season, MAX_ROUNDS};

/// Owner label for teams nobody has claimed.
pub const UNCLAIMED_LABEL: &str = "Unclaimed";

/// One line of the standings table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandingRow {
    /// 1-based rank.
    pub position: usize,
    /// Team name.
    pub team: &'static str,
    /// Owner display name, `None` when unclaimed.
    pub owner: Option<String>,
    /// Accumulated points.
    pub points: u32,
    /// Accumulated money.
    pub money: u64,
}

impl StandingRow {
    /// Owner for display.
    pub fn owner_label(&self) -> &str {
        self.owner.as_deref().unwrap_or(UNCLAIMED_LABEL)
    }

    /// `<pos>. <team> - <owner> | <points> P | €<money>`
    pub fn render(&self) -> String {
        format!(
            "{}. {} - {} | {} P | €{}",
            self.position,
            self.team,
            self.owner_label(),
            self.points,
            self.money
        )
    }
}

/// All teams sorted by points, descending. Ties keep registry order.
pub fn rank(season: &Season) -> Vec<StandingRow> {
    let mut rows: Vec<StandingRow> = season
        .teams_in_order()
        .map(|(team, state)| StandingRow {
            position: 0,
            team,
            owner: state.owner_name.clone(),
            points: state.points,
            money: state.money,
        })
        .collect();
    // Stable sort: equal points keep registry order.
    rows.sort_by(|a, b| b.points.cmp(&a.points));
    for (idx, row) in rows.iter_mut().enumerate() {
        row.position = idx + 1;
    }
    rows
}

/// Standings plus the header and footer shown with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overview {
    /// Season the standings belong to.
    pub season_id: String,
    /// Weekends played.
    pub round: u32,
    /// Ranked rows.
    pub rows: Vec<StandingRow>,
}

impl Overview {
    /// Build the overview for a season.
    pub fn from_season(season: &Season) -> Self {
        Self {
            season_id: season.season_id.clone(),
            round: season.round,
            rows: rank(season),
        }
    }

    /// `Season <id> Overview`
    pub fn title(&self) -> String {
        format!("Season {} Overview", self.season_id)
    }

    /// `Round <round>/<max>`
    pub fn footer(&self) -> String {
        format!("Round {}/{}", self.round, MAX_ROUNDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::{
        draft::apply_claim,
        models::{Claimant, TEAM_NAMES},
        weekend::apply_race,
    };

    #[test]
    fn untouched_season_ranks_in_registry_order() {
        let season = Season::new("S1", Utc::now());
        let rows = rank(&season);
        let teams: Vec<_> = rows.iter().map(|row| row.team).collect();
        assert_eq!(teams, TEAM_NAMES.to_vec());
        assert!(rows.iter().all(|row| row.owner_label() == UNCLAIMED_LABEL));
        assert_eq!(rows[0].position, 1);
        assert_eq!(rows[9].position, 10);
    }

    #[test]
    fn ranks_by_points_with_registry_tie_break() {
        let mut season = Season::new("S1", Utc::now());
        for team in ["Sauber", "Ferrari", "Haas"] {
            apply_claim(&mut season, team, &Claimant::new(team, format!("owner of {team}")))
                .expect("claim");
        }
        apply_race(
            &mut season,
            &["Sauber".to_string(), "Ferrari".to_string(), "Haas".to_string()],
        );
        // Give Ferrari the same total as Sauber.
        if let Some(state) = season.team_mut("Ferrari") {
            state.award(7);
        }

        let rows = rank(&season);
        assert_eq!(rows[0].team, "Ferrari");
        assert_eq!(rows[1].team, "Sauber");
        assert_eq!(rows[0].points, rows[1].points);
        assert_eq!(rows[2].team, "Haas");
        // Zero-point teams follow in registry order.
        assert_eq!(rows[3].team, "Red Bull");
        assert_eq!(rows[4].team, "Mercedes");

        assert_eq!(
            rows[2].render(),
            "3. Haas - owner of Haas | 15 P | €150000"
        );
        assert_eq!(rows[3].render(), "4. Red Bull - Unclaimed | 0 P | €0");
    }

    #[test]
    fn overview_carries_title_and_footer() {
        let mut season = Season::new("SXYZ", Utc::now());
        season.round = 4;
        let overview = Overview::from_season(&season);
        assert_eq!(overview.title(), "Season SXYZ Overview");
        assert_eq!(overview.footer(), "Round 4/10");
        assert_eq!(overview.rows.len(), TEAM_NAMES.len());
    }
}
