mod app;

use std::{
    fs::{self, OpenOptions},
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use f1season_core::{
    config::{self, AppConfig},
    Claimant, JsonSeasonStore, SeasonCommands, SeasonRepository,
};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let config_path = config::ensure_default_config()?;
    let config = AppConfig::load()?;
    info!(
        config = %config_path.display(),
        data = %config.data_path.display(),
        channel = %config.announcement_channel,
        "starting f1season"
    );

    let store = Arc::new(JsonSeasonStore::new(config.data_path.clone()));
    let repo = Arc::new(SeasonRepository::new(store));
    let bus = app::EventBus::new();
    let announcer = Arc::new(bus.announcer(config.known_channels.clone()));
    let commands = Arc::new(SeasonCommands::new(
        repo,
        announcer,
        config.announcement_channel.clone(),
    ));
    let operator = Claimant::new(config.operator_id.clone(), config.operator_name.clone());

    let mut app = app::SeasonApp::new(commands, operator, config.announcement_channel, bus);
    app.run().await
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("f1season.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // The terminal belongs to the UI, so logs only go to the file.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
