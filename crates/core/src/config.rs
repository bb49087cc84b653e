//! Application configuration.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::store::JsonSeasonStore;

/// Directory under `~/.config` holding the config file.
pub const CONFIG_DIR: &str = "f1season";
/// Config file name.
pub const CONFIG_FILE: &str = "config.toml";
/// Channel used when none is configured.
pub const DEFAULT_ANNOUNCEMENT_CHANNEL: &str = "f1";
/// Environment prefix for overrides, e.g. `F1SEASON_ANNOUNCEMENT_CHANNEL`.
pub const ENV_PREFIX: &str = "F1SEASON";
/// Legacy variable naming the announcement channel.
pub const LEGACY_CHANNEL_VAR: &str = "F1_CHANNEL_NAME";

const DEFAULT_CONFIG: &str = r#"# f1season configuration

# Channel the team claim board is posted to.
announcement_channel = "f1"

# Channels this host can resolve.
known_channels = ["f1"]

# Location of the persisted season record. Defaults to the user data directory.
# data_path = "/var/lib/f1season/season.json"

# Opaque identity and credential handed to the hosting platform.
# application_id = ""
# deploy_token = ""

# Identity used for claims made from this terminal.
# operator_id = "local"
# operator_name = "Race Control"
"#;

/// Runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Channel the claim prompt is announced in.
    pub announcement_channel: String,
    /// Channels the host is able to post to.
    pub known_channels: Vec<String>,
    /// Persisted season record.
    pub data_path: PathBuf,
    /// Application identity on the hosting platform.
    #[serde(default)]
    pub application_id: Option<String>,
    /// Deployment credential; never logged.
    #[serde(default, skip_serializing)]
    pub deploy_token: Option<String>,
    /// Claimant id for claims issued by this host's operator.
    pub operator_id: String,
    /// Claimant display name for the operator.
    pub operator_name: String,
}

impl AppConfig {
    /// Load defaults, the user config file and environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load with an explicit config file location.
    pub fn load_from(path: &Path) -> Result<Self> {
        let user = env::var("USER").unwrap_or_else(|_| "operator".to_string());
        let mut builder = Config::builder()
            .set_default("announcement_channel", DEFAULT_ANNOUNCEMENT_CHANNEL)?
            .set_default("known_channels", vec![DEFAULT_ANNOUNCEMENT_CHANNEL])?
            .set_default(
                "data_path",
                JsonSeasonStore::default_path().to_string_lossy().to_string(),
            )?
            .set_default("operator_id", user.clone())?
            .set_default("operator_name", user)?
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("known_channels"),
            );
        if let Some(channel) = env::var(LEGACY_CHANNEL_VAR)
            .ok()
            .filter(|value| !value.trim().is_empty())
        {
            builder = builder.set_override("announcement_channel", channel)?;
        }

        builder
            .build()
            .with_context(|| format!("failed to read configuration from {}", path.display()))?
            .try_deserialize()
            .context("invalid configuration")
    }

    /// Whether `channel` is one the host can post to.
    pub fn resolves_channel(&self, channel: &str) -> bool {
        self.known_channels.iter().any(|known| known == channel)
    }
}

/// Location of the user config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
        .join(CONFIG_FILE)
}

/// Write the default config file if none exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    write_default_config(&path)?;
    Ok(path)
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_file_round_trips_to_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        write_default_config(&path)?;
        assert!(path.exists());

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.known_channels, vec!["f1".to_string()]);
        assert!(config.resolves_channel("f1"));
        assert!(!config.resolves_channel("general"));
        assert!(config.deploy_token.is_none());
        Ok(())
    }

    #[test]
    fn file_values_override_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        let data_path = dir.path().join("season.json");
        fs::write(
            &path,
            format!(
                "known_channels = [\"f1\", \"paddock\"]\ndata_path = {:?}\noperator_name = \"Marshal\"\n",
                data_path.to_string_lossy()
            ),
        )?;

        let config = AppConfig::load_from(&path)?;
        assert!(config.resolves_channel("paddock"));
        assert_eq!(config.data_path, data_path);
        assert_eq!(config.operator_name, "Marshal");
        Ok(())
    }

    #[test]
    fn existing_config_is_not_overwritten() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "operator_id = \"kept\"\n")?;
        write_default_config(&path)?;
        assert_eq!(fs::read_to_string(&path)?, "operator_id = \"kept\"\n");
        Ok(())
    }
}
