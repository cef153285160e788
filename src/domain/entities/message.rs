use super::User;
use chrono::{DateTime, Utc};

/// Where a message was posted: a channel, optionally inside a guild
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    pub channel_id: String,
    pub guild_id: Option<String>,
}

impl Scope {
    pub fn channel(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            guild_id: None,
        }
    }

    pub fn in_guild(mut self, guild_id: impl Into<String>) -> Self {
        self.guild_id = Some(guild_id.into());
        self
    }
}

/// An incoming text message
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub scope: Scope,
    pub author: User,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(scope: Scope, author: User, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            scope,
            author,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn channel_id(&self) -> &str {
        &self.scope.channel_id
    }
}
