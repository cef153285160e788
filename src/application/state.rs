//! Process-wide bot state shared with plugins and handlers

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::application::errors::BotError;
use crate::application::messaging::{OwnerSource, PendingReplyRegistry, PermissionChecker};
use crate::application::services::DebugLog;
use crate::domain::traits::{BotInfo, Transport};
use crate::infrastructure::config::{Config, PropertyReader};
use crate::plugins::Plugin;

/// Configuration, transport and the active plugin set.
///
/// Built before connecting. The bot identity is filled in on connect and the
/// plugin set is frozen once at the end of plugin setup.
pub struct BotState {
    config: Config,
    transport: Arc<dyn Transport>,
    info: OnceCell<BotInfo>,
    plugins: OnceCell<Vec<Arc<Plugin>>>,
    pending_replies: Arc<PendingReplyRegistry>,
    permissions: PermissionChecker,
    debug_log: DebugLog,
    plugin_properties: PropertyReader,
}

impl BotState {
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Arc<Self> {
        let owner_source = match &config.bot.owner_id {
            Some(id) => OwnerSource::Fixed(id.clone()),
            None => OwnerSource::Transport(Arc::clone(&transport)),
        };
        let permissions = PermissionChecker::new(owner_source, config.roles.clone());
        let debug_log = DebugLog::new(
            Arc::clone(&transport),
            config.bot.debug_log_channel_id.clone(),
        );
        let plugin_properties = PropertyReader::new(config.plugins.properties.clone());

        Arc::new(Self {
            config,
            transport,
            info: OnceCell::new(),
            plugins: OnceCell::new(),
            pending_replies: PendingReplyRegistry::new(),
            permissions,
            debug_log,
            plugin_properties,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// The bot's own identity, once connected
    pub fn info(&self) -> Option<&BotInfo> {
        self.info.get()
    }

    pub fn is_connected(&self) -> bool {
        self.info.get().is_some()
    }

    pub(crate) fn set_info(&self, info: BotInfo) -> Result<(), BotError> {
        self.info
            .set(info)
            .map_err(|_| BotError::Internal("bot identity already set".to_string()))
    }

    /// Successfully set up plugins; empty until startup froze the set
    pub fn plugins(&self) -> &[Arc<Plugin>] {
        self.plugins.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn freeze_plugins(&self, plugins: Vec<Arc<Plugin>>) -> Result<(), BotError> {
        self.plugins
            .set(plugins)
            .map_err(|_| BotError::Internal("plugin set already frozen".to_string()))
    }

    pub fn pending_replies(&self) -> &Arc<PendingReplyRegistry> {
        &self.pending_replies
    }

    pub fn permissions(&self) -> &PermissionChecker {
        &self.permissions
    }

    pub fn plugin_properties(&self) -> &PropertyReader {
        &self.plugin_properties
    }

    pub async fn owner_id(&self) -> Option<String> {
        self.permissions.owner_id().await
    }

    /// Sends a message to the debug-log channel, if one is configured
    pub async fn log(&self, message: &str) {
        self.debug_log.log(message).await;
    }

    /// Platform format of an emoji installed in one of the emoji guilds, or
    /// the name wrapped in colons when it can't be found.
    pub async fn emoji(&self, name: &str) -> String {
        let fallback = format!(":{}:", name);
        if !self.is_connected() {
            return fallback;
        }
        for guild_id in &self.config.bot.emoji_guild_ids {
            match self.transport.guild_emojis(guild_id).await {
                Ok(emojis) => {
                    if let Some(emoji) = emojis.iter().find(|e| e.name.eq_ignore_ascii_case(name)) {
                        return emoji.as_format();
                    }
                }
                Err(e) => {
                    debug!(guild = %guild_id, "Emoji lookup failed: {}", e);
                    return fallback;
                }
            }
        }
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::traits::Emoji;
    use crate::infrastructure::adapters::memory::MemoryTransport;

    fn emoji(id: &str, name: &str, animated: bool) -> Emoji {
        Emoji {
            id: id.to_string(),
            name: name.to_string(),
            animated,
        }
    }

    fn connected(transport: MemoryTransport) -> Arc<BotState> {
        let mut config = Config::default();
        config.bot.emoji_guild_ids = ["g1", "g2"].iter().map(|s| s.to_string()).collect();
        let transport: Arc<MemoryTransport> = Arc::new(transport);
        let info = transport.info().clone();
        let bot = BotState::new(config, transport);
        bot.set_info(info).unwrap();
        bot
    }

    #[tokio::test]
    async fn test_emoji_found_case_insensitive() {
        let transport = MemoryTransport::new()
            .with_emojis("g1", vec![emoji("11", "Pog", false)])
            .with_emojis("g2", vec![emoji("22", "party", true)]);
        let bot = connected(transport);

        assert_eq!(bot.emoji("pog").await, "<:Pog:11>");
        assert_eq!(bot.emoji("PARTY").await, "<a:party:22>");
    }

    #[tokio::test]
    async fn test_emoji_not_found_falls_back() {
        let transport = MemoryTransport::new().with_emojis("g1", vec![emoji("11", "pog", false)]);
        let bot = connected(transport);
        assert_eq!(bot.emoji("missing").await, ":missing:");
    }

    #[tokio::test]
    async fn test_emoji_before_connect_falls_back() {
        let mut config = Config::default();
        config.bot.emoji_guild_ids = ["g1".to_string()].into_iter().collect();
        let transport =
            Arc::new(MemoryTransport::new().with_emojis("g1", vec![emoji("11", "pog", false)]));
        let bot = BotState::new(config, transport);

        assert!(!bot.is_connected());
        assert_eq!(bot.emoji("pog").await, ":pog:");
    }

    #[tokio::test]
    async fn test_emoji_lookup_error_falls_back() {
        let transport = MemoryTransport::new()
            .with_emojis("g1", vec![emoji("11", "pog", false)])
            .failing_emojis();
        let bot = connected(transport);
        assert_eq!(bot.emoji("pog").await, ":pog:");
    }
}
