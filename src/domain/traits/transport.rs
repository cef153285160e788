use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::application::errors::TransportError;
use crate::domain::entities::Message;

/// Transport trait - abstraction for chat platform adapters
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to the platform and start delivering incoming messages
    async fn connect(&self, options: ConnectOptions) -> Result<Connection, TransportError>;

    /// Send a message to a channel, returning the platform message id
    async fn send_message(&self, channel_id: &str, text: &str) -> Result<String, TransportError>;

    /// Id of the user owning the bot application, if the platform knows one
    async fn application_owner(&self) -> Result<Option<String>, TransportError>;

    /// Custom emojis installed in a guild
    async fn guild_emojis(&self, _guild_id: &str) -> Result<Vec<Emoji>, TransportError> {
        Ok(Vec::new())
    }

    /// Most recent cached messages of a channel, newest first
    fn recent_messages(&self, _channel_id: &str, _limit: usize) -> Vec<Message> {
        Vec::new()
    }
}

/// Options applied when connecting
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub status: Presence,
    /// Upper bound of the incoming message cache, `None` disables caching
    pub message_cache_size: Option<usize>,
}

/// Initial presence shown by the bot
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Presence {
    #[serde(default)]
    pub kind: PresenceKind,
    #[serde(default)]
    pub activity: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresenceKind {
    #[default]
    Online,
    Idle,
    DoNotDisturb,
    Invisible,
}

/// A live connection handed back by [`Transport::connect`]
pub struct Connection {
    pub info: BotInfo,
    pub incoming: mpsc::Receiver<Message>,
    /// Resolves (or errors when its sender drops) once the connection is lost
    pub disconnected: oneshot::Receiver<()>,
}

/// Bot information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotInfo {
    pub id: String,
    pub name: String,
    pub username: String,
}

/// A guild custom emoji
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emoji {
    pub id: String,
    pub name: String,
    pub animated: bool,
}

impl Emoji {
    /// Inline format understood by the platform
    pub fn as_format(&self) -> String {
        if self.animated {
            format!("<a:{}:{}>", self.name, self.id)
        } else {
            format!("<:{}:{}>", self.name, self.id)
        }
    }
}
