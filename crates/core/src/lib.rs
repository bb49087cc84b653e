#![warn(clippy::all, missing_docs)]

//! Core domain logic for the F1 fantasy season.
//!
//! This crate hosts the season data model, the draft, weekend simulation
//! and standings rules, configuration handling, and the persistence layer
//! used by the terminal host and any future frontends.

pub mod commands;
pub mod config;
pub mod draft;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod repository;
pub mod standings;
pub mod store;
pub mod weekend;

pub use commands::{Announcement, Announcer, Command, Reply, ReplyBody, SeasonCommands, Visibility};
pub use config::AppConfig;
pub use error::{ErrorKind, SeasonError};
pub use models::{Claimant, Season, SeasonStatus, TeamState, WeekendResult};
pub use repository::SeasonRepository;
pub use store::{JsonSeasonStore, MemorySeasonStore, SeasonStore};
