//! Season creation and resumption.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::{error::SeasonError, models::Season, repository::SeasonRepository};

/// Result of [`get_or_create_season`].
#[derive(Debug, Clone)]
pub enum SeasonStart {
    /// An active season already existed and was returned unchanged.
    Resumed(Season),
    /// A new season was created and persisted.
    Created(Season),
}

impl SeasonStart {
    /// The season regardless of how it was obtained.
    pub fn season(&self) -> &Season {
        match self {
            Self::Resumed(season) | Self::Created(season) => season,
        }
    }

    /// Consume and return the season.
    pub fn into_season(self) -> Season {
        match self {
            Self::Resumed(season) | Self::Created(season) => season,
        }
    }

    /// Whether this call created the season.
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Return the active season, creating and persisting a new one when none is active.
pub async fn get_or_create_season(repo: &SeasonRepository) -> Result<SeasonStart, SeasonError> {
    let mut txn = repo.begin().await;
    if let Some(existing) = txn.load()? {
        if existing.is_active() {
            return Ok(SeasonStart::Resumed(existing));
        }
    }

    let now = Utc::now();
    let season = txn.commit(Season::new(generate_season_id(now), now))?;
    info!(season_id = %season.season_id, "season created");
    Ok(SeasonStart::Created(season))
}

/// `S` followed by the creation time in milliseconds, base-36 encoded in upper case.
pub fn generate_season_id(now: DateTime<Utc>) -> String {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or_default();
    format!("S{}", to_base36(millis))
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::TimeZone;

    use crate::{
        models::{SeasonStatus, MAX_ROUNDS, TEAM_NAMES},
        store::{MemorySeasonStore, SeasonStore},
    };

    #[test]
    fn season_ids_are_base36_timestamps() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        assert_eq!(generate_season_id(at), "SLOYW3V28");
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "Z");
        assert_eq!(to_base36(36), "10");
    }

    #[tokio::test]
    async fn creates_season_when_none_exists() -> Result<(), SeasonError> {
        let store = Arc::new(MemorySeasonStore::new());
        let repo = SeasonRepository::new(store.clone());

        let start = get_or_create_season(&repo).await?;
        assert!(start.is_created());
        let season = start.season();
        assert!(season.season_id.starts_with('S'));
        assert_eq!(season.status, SeasonStatus::Active);
        assert_eq!(season.round, 0);
        assert!(season.history.is_empty());
        assert_eq!(season.teams.len(), TEAM_NAMES.len());
        assert_eq!(store.load()?.as_ref(), Some(season));
        Ok(())
    }

    #[tokio::test]
    async fn active_season_is_resumed_unchanged() -> Result<(), SeasonError> {
        let repo = SeasonRepository::new(Arc::new(MemorySeasonStore::new()));
        let first = get_or_create_season(&repo).await?.into_season();

        let second = get_or_create_season(&repo).await?;
        assert!(!second.is_created());
        assert_eq!(second.season(), &first);
        Ok(())
    }

    #[tokio::test]
    async fn complete_season_is_replaced() -> Result<(), SeasonError> {
        let mut finished = Season::new("SOLD", Utc::now());
        finished.round = MAX_ROUNDS;
        finished.status = SeasonStatus::Complete;
        let repo = SeasonRepository::new(Arc::new(MemorySeasonStore::with_season(finished)));

        let start = get_or_create_season(&repo).await?;
        assert!(start.is_created());
        assert_ne!(start.season().season_id, "SOLD");
        assert_eq!(start.season().round, 0);
        Ok(())
    }
}
