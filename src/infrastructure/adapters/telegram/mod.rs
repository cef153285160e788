//! Telegram adapter

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::application::errors::TransportError;
use crate::domain::entities;
use crate::domain::traits::{BotInfo, Connection, ConnectOptions, Transport};
use crate::infrastructure::adapters::cache::MessageCache;

/// Telegram API base URL
const API_BASE: &str = "https://api.telegram.org";

/// Long-poll timeout passed to getUpdates, in seconds
const POLL_TIMEOUT: i64 = 30;

/// Polling gives up (and the connection counts as lost) after this many
/// consecutive failures
const MAX_POLL_ERRORS: u32 = 5;

const POLL_BACKOFF: Duration = Duration::from_secs(2);

/// Telegram update type
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// Every Bot API response is wrapped like this
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, TransportError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TransportError::Network(format!(
                "Telegram API error: {}",
                self.description.unwrap_or_else(|| "unknown".to_string())
            ))),
        }
    }
}

impl Message {
    /// Converts a text message; other updates are dropped
    fn into_domain(self) -> Option<entities::Message> {
        let text = self.text?;
        let from = self.from?;

        let mut author = entities::User::new(from.id.to_string());
        if let Some(username) = from.username.or(from.first_name) {
            author = author.with_username(username);
        }
        if from.is_bot {
            author = author.as_bot();
        }

        let chat_id = self.chat.id.to_string();
        let mut scope = entities::Scope::channel(chat_id.clone());
        // Group chats play the role of guilds for role grants.
        if matches!(self.chat.kind.as_str(), "group" | "supergroup") {
            scope = scope.in_guild(chat_id);
        }

        Some(entities::Message::new(scope, author, text).with_id(self.message_id.to_string()))
    }
}

/// Telegram bot adapter, receiving updates by long polling
pub struct TelegramAdapter {
    token: String,
    client: Client,
    cache: OnceCell<Option<Arc<MessageCache>>>,
}

impl TelegramAdapter {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            client: Client::new(),
            cache: OnceCell::new(),
        }
    }

    /// Get the API URL for a method
    fn api_url(token: &str, method: &str) -> String {
        format!("{}/bot{}/{}", API_BASE, token, method)
    }

    /// Fetch bot info from Telegram API
    pub async fn fetch_bot_info(&self) -> Result<BotInfo, TransportError> {
        #[derive(Deserialize)]
        struct Me {
            id: i64,
            first_name: String,
            username: String,
        }

        let url = Self::api_url(&self.token, "getMe");
        let response = self.client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(TransportError::Auth("token rejected by Telegram".to_string()));
        }
        let me = response.json::<ApiResponse<Me>>().await?.into_result()?;

        Ok(BotInfo {
            id: me.id.to_string(),
            name: me.first_name,
            username: me.username,
        })
    }

    /// Get updates from Telegram using getUpdates API
    async fn get_updates(
        client: &Client,
        token: &str,
        offset: i64,
        timeout: i64,
    ) -> Result<Vec<Update>, TransportError> {
        #[derive(Serialize)]
        struct GetUpdatesRequest {
            offset: i64,
            timeout: i64,
            allowed_updates: Vec<String>,
        }

        let request = GetUpdatesRequest {
            offset,
            timeout,
            allowed_updates: vec!["message".to_string()],
        };

        let response = client
            .post(Self::api_url(token, "getUpdates"))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::Network(format!(
                "Telegram API error: {}",
                response.status()
            )));
        }

        response.json::<ApiResponse<Vec<Update>>>().await?.into_result()
    }

    /// Get the next update offset
    pub fn next_offset(updates: &[Update], current: i64) -> i64 {
        updates
            .iter()
            .map(|u| u.update_id + 1)
            .max()
            .unwrap_or(current)
            .max(current)
    }

    /// Send a message with specific parse mode
    async fn send_message_with_format(
        &self,
        chat_id: &str,
        text: &str,
        parse_mode: Option<&str>,
    ) -> Result<String, TransportError> {
        #[derive(Serialize)]
        struct SendMessageRequest<'a> {
            chat_id: &'a str,
            text: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            parse_mode: Option<&'a str>,
        }

        #[derive(Deserialize)]
        struct MessageResult {
            message_id: i64,
        }

        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode,
        };

        let response = self
            .client
            .post(Self::api_url(&self.token, "sendMessage"))
            .json(&request)
            .send()
            .await?;

        match response.status() {
            reqwest::StatusCode::BAD_REQUEST if parse_mode.is_some() => {
                return Err(TransportError::Parse("markup rejected".to_string()));
            }
            reqwest::StatusCode::BAD_REQUEST | reqwest::StatusCode::NOT_FOUND => {
                return Err(TransportError::ChannelNotFound(chat_id.to_string()));
            }
            status if !status.is_success() => {
                return Err(TransportError::Network(format!("Telegram API error: {}", status)));
            }
            _ => {}
        }

        let data = response
            .json::<ApiResponse<MessageResult>>()
            .await?
            .into_result()?;
        Ok(data.message_id.to_string())
    }

    /// Check if text has clear markdown formatting patterns
    fn has_markdown(text: &str) -> bool {
        text.contains("**") || text.contains('`')
    }
}

/// First characters of the token, enough to tell bots apart in logs
fn token_hint(token: &str) -> String {
    token.chars().take(8).collect()
}

async fn poll_updates(
    client: Client,
    token: String,
    cache: Option<Arc<MessageCache>>,
    tx: mpsc::Sender<entities::Message>,
    disconnect: oneshot::Sender<()>,
) {
    let mut offset = 0;
    let mut errors = 0;

    'poll: loop {
        match TelegramAdapter::get_updates(&client, &token, offset, POLL_TIMEOUT).await {
            Ok(updates) => {
                errors = 0;
                offset = TelegramAdapter::next_offset(&updates, offset);
                for update in updates {
                    let Some(message) = update.message.and_then(Message::into_domain) else {
                        continue;
                    };
                    if let Some(cache) = &cache {
                        cache.push(message.clone());
                    }
                    if tx.send(message).await.is_err() {
                        tracing::debug!("Receiver dropped, stopping Telegram polling");
                        break 'poll;
                    }
                }
            }
            Err(e) => {
                errors += 1;
                tracing::warn!("Failed to poll Telegram ({}/{}): {}", errors, MAX_POLL_ERRORS, e);
                if errors >= MAX_POLL_ERRORS {
                    tracing::error!("Giving up on Telegram polling");
                    break;
                }
                tokio::time::sleep(POLL_BACKOFF).await;
            }
        }
    }

    let _ = disconnect.send(());
}

#[async_trait]
impl Transport for TelegramAdapter {
    async fn connect(&self, options: ConnectOptions) -> Result<Connection, TransportError> {
        tracing::info!("Starting Telegram bot (token: {}...)", token_hint(&self.token));
        let info = self.fetch_bot_info().await?;
        if options.status.activity.is_some() {
            tracing::debug!("Telegram has no presence, ignoring configured status");
        }

        let cache = self
            .cache
            .get_or_init(|| MessageCache::for_bound(options.message_cache_size).map(Arc::new))
            .clone();
        let (tx, incoming) = mpsc::channel(64);
        let (disconnect_tx, disconnected) = oneshot::channel();
        tokio::spawn(poll_updates(
            self.client.clone(),
            self.token.clone(),
            cache,
            tx,
            disconnect_tx,
        ));

        Ok(Connection {
            info,
            incoming,
            disconnected,
        })
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<String, TransportError> {
        tracing::debug!("Sending to {}: {}", chat_id, text);

        if Self::has_markdown(text) {
            match self.send_message_with_format(chat_id, text, Some("Markdown")).await {
                Ok(id) => return Ok(id),
                Err(TransportError::Parse(_)) => {
                    tracing::warn!("Markdown rejected, using plain text");
                }
                Err(e) => return Err(e),
            }
        }
        self.send_message_with_format(chat_id, text, None).await
    }

    /// The Bot API does not expose who created a bot
    async fn application_owner(&self) -> Result<Option<String>, TransportError> {
        Ok(None)
    }

    fn recent_messages(&self, channel_id: &str, limit: usize) -> Vec<entities::Message> {
        self.cache
            .get()
            .and_then(Option::as_ref)
            .map(|cache| cache.recent(channel_id, limit))
            .unwrap_or_default()
    }
}
