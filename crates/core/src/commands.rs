//! Command surface used by hosting frontends.
//!
//! Every command is handled independently and may run concurrently with
//! others. Failures never escape [`SeasonCommands::handle`]: they become a
//! private reply to the requester, and persistence failures are logged.

use std::sync::Arc;

use rand::{rngs::StdRng, SeedableRng};
use tracing::{error, info, warn};

use crate::{
    draft::{self, parse_claim_token, ClaimBoard},
    error::{ErrorKind, SeasonError},
    lifecycle::{self, SeasonStart},
    models::{Claimant, WeekendResult},
    repository::SeasonRepository,
    standings::Overview,
    weekend::{self, Award},
};

/// An inbound user action.
#[derive(Debug, Clone)]
pub enum Command {
    /// Create a season (or report the active one) and post the claim board.
    StartSeason,
    /// Show the standings of the current or last season.
    TeamOverview,
    /// Simulate the next weekend.
    AdvanceWeekend,
    /// A board button press carrying an opaque token.
    Claim {
        /// Token attached to the pressed button.
        token: String,
        /// Who pressed it.
        claimant: Claimant,
    },
}

impl Command {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartSeason => "start-season",
            Self::TeamOverview => "team-overview",
            Self::AdvanceWeekend => "advance-weekend",
            Self::Claim { .. } => "claim",
        }
    }
}

/// Who sees a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Only the requester.
    Private,
    /// Everyone in the conversation.
    Public,
}

/// Reply payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyBody {
    /// Plain message.
    Text(String),
    /// Standings table.
    Overview(Overview),
    /// Weekend result with the awards it produced.
    Weekend {
        /// Recorded weekend.
        result: WeekendResult,
        /// Awards in race order.
        awards: Vec<Award>,
        /// Set when this weekend completed the season.
        final_round: bool,
    },
    /// Refreshed claim board after a successful claim.
    Board {
        /// Team just claimed.
        team: &'static str,
        /// Claimant display name.
        owner: String,
        /// Updated board.
        board: ClaimBoard,
        /// Lock notice once every team is taken.
        notice: Option<String>,
    },
}

/// Response to a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Audience.
    pub visibility: Visibility,
    /// Content.
    pub body: ReplyBody,
}

impl Reply {
    fn private_text(text: impl Into<String>) -> Self {
        Self {
            visibility: Visibility::Private,
            body: ReplyBody::Text(text.into()),
        }
    }

    /// Text content, when the reply is a plain message.
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            ReplyBody::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Broadcast posted to a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Announcement {
    /// Claim prompt for a freshly started season.
    ClaimPrompt {
        /// Season being drafted.
        season_id: String,
        /// Buttons to claim teams with.
        board: ClaimBoard,
    },
}

impl Announcement {
    /// Headline text of the announcement.
    pub fn headline(&self) -> String {
        match self {
            Self::ClaimPrompt { season_id, .. } => {
                format!("Season {season_id} started! Pick your F1 team:")
            }
        }
    }
}

/// Outbound side of the hosting platform.
pub trait Announcer: Send + Sync {
    /// Whether `channel` exists and can be posted to.
    fn resolve(&self, channel: &str) -> bool;

    /// Post an announcement to a resolved channel.
    fn announce(&self, channel: &str, announcement: Announcement);
}

/// Handles [`Command`]s against one season repository.
pub struct SeasonCommands {
    repo: Arc<SeasonRepository>,
    announcer: Arc<dyn Announcer>,
    channel: String,
}

impl SeasonCommands {
    /// Build a handler announcing into `channel`.
    pub fn new(
        repo: Arc<SeasonRepository>,
        announcer: Arc<dyn Announcer>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            announcer,
            channel: channel.into(),
        }
    }

    /// Repository the commands operate on.
    pub fn repository(&self) -> &Arc<SeasonRepository> {
        &self.repo
    }

    /// Handle a command. `None` means the action was not meant for us.
    pub async fn handle(&self, command: Command) -> Option<Reply> {
        let name = command.name();
        let result = match command {
            Command::StartSeason => self.start_season().await.map(Some),
            Command::TeamOverview => self.team_overview().map(Some),
            Command::AdvanceWeekend => self.advance_weekend().await.map(Some),
            Command::Claim { token, claimant } => self.claim_team(&token, &claimant).await,
        };
        match result {
            Ok(reply) => reply,
            Err(err) => {
                match err.kind() {
                    ErrorKind::Persistence => error!(command = name, ?err, "command failed"),
                    ErrorKind::Validation | ErrorKind::State => {
                        warn!(command = name, %err, "command rejected")
                    }
                }
                Some(Reply::private_text(err.user_message()))
            }
        }
    }

    /// Start a season, or report the one already running.
    pub async fn start_season(&self) -> Result<Reply, SeasonError> {
        if !self.announcer.resolve(&self.channel) {
            return Err(SeasonError::ChannelNotFound(self.channel.clone()));
        }

        let season = match lifecycle::get_or_create_season(&self.repo).await? {
            SeasonStart::Resumed(season) => {
                return Ok(Reply::private_text(format!(
                    "Season {} is already active.",
                    season.season_id
                )));
            }
            SeasonStart::Created(season) => season,
        };

        self.announcer.announce(
            &self.channel,
            Announcement::ClaimPrompt {
                season_id: season.season_id.clone(),
                board: ClaimBoard::from_season(&season),
            },
        );
        info!(season_id = %season.season_id, channel = %self.channel, "claim board posted");
        Ok(Reply::private_text(format!(
            "Team buttons posted. Season ID: {}",
            season.season_id
        )))
    }

    /// Standings of the current (or last completed) season, read fresh from the store.
    pub fn team_overview(&self) -> Result<Reply, SeasonError> {
        let season = self.repo.reload()?.ok_or(SeasonError::NoSeason)?;
        Ok(Reply {
            visibility: Visibility::Private,
            body: ReplyBody::Overview(Overview::from_season(&season)),
        })
    }

    /// Simulate the next weekend and publish the result.
    pub async fn advance_weekend(&self) -> Result<Reply, SeasonError> {
        let mut rng = StdRng::from_entropy();
        let outcome = weekend::run_weekend(&self.repo, &mut rng).await?;
        let final_round = outcome.season_complete();
        Ok(Reply {
            visibility: Visibility::Public,
            body: ReplyBody::Weekend {
                result: outcome.result,
                awards: outcome.awards,
                final_round,
            },
        })
    }

    /// Claim the team named by a board token. Unrelated tokens are ignored.
    pub async fn claim_team(
        &self,
        token: &str,
        claimant: &Claimant,
    ) -> Result<Option<Reply>, SeasonError> {
        let Some(team) = parse_claim_token(token) else {
            return Ok(None);
        };
        let outcome = draft::claim(&self.repo, team, claimant).await?;
        let notice = outcome.all_claimed.then(|| {
            format!(
                "All teams are taken. Season {} is locked.",
                outcome.season.season_id
            )
        });
        Ok(Some(Reply {
            visibility: Visibility::Public,
            body: ReplyBody::Board {
                team: outcome.team,
                owner: claimant.name.clone(),
                board: outcome.board(),
                notice,
            },
        }))
    }
}
