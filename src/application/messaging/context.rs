//! Per-invocation context handed to command handlers

use std::sync::Arc;

use crate::application::errors::CommandError;
use crate::application::state::BotState;
use crate::domain::entities::{CommandTable, Message, Scope, User};

use super::pending::PendingReply;

/// Context of one command invocation
#[derive(Clone)]
pub struct CommandContext {
    pub message: Message,
    /// Command name as routed (lowercase, may be an alias)
    pub invoked_as: String,
    bot: Arc<BotState>,
    commands: Arc<CommandTable>,
}

impl CommandContext {
    pub fn new(
        message: Message,
        invoked_as: impl Into<String>,
        bot: Arc<BotState>,
        commands: Arc<CommandTable>,
    ) -> Self {
        Self {
            message,
            invoked_as: invoked_as.into(),
            bot,
            commands,
        }
    }

    pub fn bot(&self) -> &Arc<BotState> {
        &self.bot
    }

    /// The routing table the invocation was resolved against
    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }

    pub fn author(&self) -> &User {
        &self.message.author
    }

    pub fn channel_id(&self) -> &str {
        self.message.channel_id()
    }

    pub fn scope(&self) -> &Scope {
        &self.message.scope
    }

    /// Sends text to the channel the command came from
    pub async fn reply(&self, text: &str) -> Result<String, CommandError> {
        Ok(self
            .bot
            .transport()
            .send_message(self.channel_id(), text)
            .await?)
    }

    /// Opens an interactive follow-up for the author in this channel. The
    /// next command they send here cancels it.
    pub fn open_pending_reply<F>(&self, cancel: F) -> PendingReply
    where
        F: FnOnce() + Send + 'static,
    {
        self.bot
            .pending_replies()
            .open(self.channel_id(), &self.message.author.id, cancel)
    }
}
