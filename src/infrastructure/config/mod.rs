//! Configuration management

pub mod properties;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::application::errors::ConfigError;
use crate::application::messaging::RoleGrant;
use crate::domain::traits::{ConnectOptions, Presence};

pub use properties::PropertyReader;

/// Bot configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub adapter: AdapterKind,
    #[serde(default)]
    pub startup: StartupConfig,
    #[serde(default)]
    pub roles: Vec<RoleGrant>,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub plugins: PluginsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BotConfig {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Overrides the owner reported by the platform
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub debug_log_channel_id: Option<String>,
    #[serde(default)]
    pub emoji_guild_ids: BTreeSet<String>,
    #[serde(default)]
    pub message_cache_max_size: Option<usize>,
    #[serde(default)]
    pub status: Presence,
}

fn default_prefix() -> String {
    "!".to_string()
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: None,
            prefix: default_prefix(),
            owner_id: None,
            debug_log_channel_id: None,
            emoji_guild_ids: BTreeSet::new(),
            message_cache_max_size: None,
            status: Presence::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdapterKind {
    #[default]
    Console,
    Telegram,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct StartupConfig {
    /// Skip plugins whose setup fails instead of aborting startup
    #[serde(default)]
    pub partial_activation: bool,
    #[serde(default)]
    pub duplicate_commands: DuplicateCommands,
}

/// What to do when two providers register the same command name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateCommands {
    /// Last registration wins
    #[default]
    Override,
    /// Abort startup
    Reject,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DatabaseConfig {
    pub path: PathBuf,
    #[serde(default = "default_schema_dir")]
    pub schema_dir: PathBuf,
}

fn default_schema_dir() -> PathBuf {
    PathBuf::from("schema")
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PluginsConfig {
    /// Only these plugin ids are set up when present
    #[serde(default)]
    pub enabled: Option<Vec<String>>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Parse(format!("Failed to serialize config: {}", e)))
    }

    pub fn load_env() -> Self {
        let mut config = Config::default();
        config.apply_env();
        config
    }

    /// Environment variables override file values
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("BOT_TOKEN") {
            self.bot.token = Some(token);
        }
        if let Ok(prefix) = std::env::var("BOT_PREFIX") {
            self.bot.prefix = prefix;
        }
        if let Ok(owner) = std::env::var("BOT_OWNER_ID") {
            self.bot.owner_id = Some(owner);
        }
        if let Ok(channel) = std::env::var("BOT_DEBUG_LOG_CHANNEL") {
            self.bot.debug_log_channel_id = Some(channel);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidValue(format!(
                "bot.prefix must not contain whitespace: {:?}",
                self.bot.prefix
            )));
        }
        if self.adapter == AdapterKind::Telegram && self.bot.token.is_none() {
            return Err(ConfigError::MissingField("bot.token".to_string()));
        }
        Ok(())
    }

    /// Absent or zero disables the message cache
    pub fn message_cache_size(&self) -> Option<usize> {
        self.bot.message_cache_max_size.filter(|size| *size >= 1)
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            status: self.bot.status.clone(),
            message_cache_size: self.message_cache_size(),
        }
    }

    pub fn plugin_enabled(&self, id: &str) -> bool {
        match &self.plugins.enabled {
            Some(enabled) => enabled.iter().any(|e| e == id),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Role;
    use crate::domain::traits::PresenceKind;

    #[test]
    fn test_minimal_config_defaults_to_disabled_features() {
        let config = Config::from_yaml("bot: {}\n").unwrap();
        assert_eq!(config.bot.prefix, "!");
        assert!(config.bot.debug_log_channel_id.is_none());
        assert!(config.bot.emoji_guild_ids.is_empty());
        assert!(config.message_cache_size().is_none());
        assert!(config.database.is_none());
        assert!(!config.startup.partial_activation);
        assert_eq!(config.startup.duplicate_commands, DuplicateCommands::Override);
        assert!(config.plugin_enabled("anything"));
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
bot:
  token: abc
  prefix: "gd!"
  owner-id: "1"
  debug-log-channel-id: "99"
  emoji-guild-ids: ["10", "11"]
  message-cache-max-size: 500
  status:
    kind: do-not-disturb
    activity: "!help"
adapter: telegram
startup:
  partial-activation: true
  duplicate-commands: reject
roles:
  - role: moderator
    user-id: "5"
    guild-id: "10"
database:
  path: bot.db
plugins:
  enabled: [core]
  properties:
    gd.client.host: example.org
"#;
        let config = Config::from_yaml(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.adapter, AdapterKind::Telegram);
        assert_eq!(config.message_cache_size(), Some(500));
        assert_eq!(config.bot.status.kind, PresenceKind::DoNotDisturb);
        assert_eq!(config.roles[0].role, Role::Moderator);
        assert_eq!(config.database.as_ref().unwrap().schema_dir, PathBuf::from("schema"));
        assert!(config.plugin_enabled("core"));
        assert!(!config.plugin_enabled("gd"));
        assert_eq!(config.startup.duplicate_commands, DuplicateCommands::Reject);
    }

    #[test]
    fn test_zero_cache_size_disables_cache() {
        let config = Config::from_yaml("bot:\n  message-cache-max-size: 0\n").unwrap();
        assert!(config.message_cache_size().is_none());
    }

    #[test]
    fn test_telegram_requires_token() {
        let config = Config::from_yaml("bot: {}\nadapter: telegram\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::MissingField(_))));
    }

    #[test]
    fn test_default_round_trips_through_yaml() {
        let yaml = Config::default().to_yaml().unwrap();
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.bot.prefix, "!");
    }
}
