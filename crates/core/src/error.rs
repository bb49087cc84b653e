#![allow(missing_docs)]

//! Error taxonomy shared by every season operation.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::models::MAX_ROUNDS;

/// Broad category of a [`SeasonError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request named something that does not exist.
    Validation,
    /// The request is not allowed in the current season state.
    State,
    /// Durable storage failed; prior state is still authoritative.
    Persistence,
}

/// Errors produced by season operations.
#[derive(Debug, Error)]
pub enum SeasonError {
    #[error("unknown team '{0}'")]
    UnknownTeam(String),
    #[error("announcement channel '{0}' not found")]
    ChannelNotFound(String),
    #[error("no season has been created")]
    NoSeason,
    #[error("season is not active")]
    SeasonNotActive,
    #[error("season {0} is already complete")]
    SeasonComplete(String),
    #[error("team '{0}' is already claimed")]
    AlreadyClaimed(String),
    #[error("no teams have been selected yet")]
    NoTeamsSelected,
    #[error("failed to {action} {}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode season record")]
    Serialization(#[from] serde_json::Error),
    #[error("season record is invalid: {0}")]
    CorruptRecord(String),
    #[error("season record changed underneath (expected revision {expected}, found {found})")]
    RevisionConflict { expected: u64, found: u64 },
}

/// `Io` action recorded when the record itself could not be read.
pub(crate) const READ_ACTION: &str = "read";

impl SeasonError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Category used by callers to decide how to log and reply.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownTeam(_) | Self::ChannelNotFound(_) => ErrorKind::Validation,
            Self::NoSeason
            | Self::SeasonNotActive
            | Self::SeasonComplete(_)
            | Self::AlreadyClaimed(_)
            | Self::NoTeamsSelected => ErrorKind::State,
            Self::Io { .. }
            | Self::Serialization(_)
            | Self::CorruptRecord(_)
            | Self::RevisionConflict { .. } => ErrorKind::Persistence,
        }
    }

    /// Message shown to the requester.
    pub fn user_message(&self) -> String {
        match self {
            Self::UnknownTeam(team) => format!("Unknown team: {team}."),
            Self::ChannelNotFound(channel) => format!("Channel #{channel} not found."),
            Self::NoSeason | Self::SeasonNotActive => {
                "No active season found. Use start-season first.".to_string()
            }
            Self::SeasonComplete(id) => {
                format!("Season {id} is already complete ({MAX_ROUNDS} rounds played).")
            }
            Self::AlreadyClaimed(team) => format!("{team} has already been claimed."),
            Self::NoTeamsSelected => "No teams have been selected yet.".to_string(),
            _ if self.is_read_failure() => {
                "The season could not be read. Nothing was changed; please try again.".to_string()
            }
            Self::Io { .. }
            | Self::Serialization(_)
            | Self::CorruptRecord(_)
            | Self::RevisionConflict { .. } => {
                "The season could not be saved. Nothing was changed; please try again.".to_string()
            }
        }
    }

    /// Failure while reading or decoding the stored record.
    pub fn is_read_failure(&self) -> bool {
        match self {
            Self::Io { action, .. } => *action == READ_ACTION,
            Self::CorruptRecord(_) => true,
            _ => false,
        }
    }
}
