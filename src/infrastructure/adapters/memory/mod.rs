//! In-process transport, used by tests and embedding applications

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use tokio::sync::{mpsc, oneshot, Notify};

use crate::application::errors::TransportError;
use crate::domain::entities::{Message, Scope, User};
use crate::domain::traits::{BotInfo, Connection, ConnectOptions, Emoji, Transport};
use crate::infrastructure::adapters::cache::MessageCache;

const INCOMING_BUFFER: usize = 64;

/// A message the bot sent through the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel_id: String,
    pub text: String,
}

#[derive(Default)]
struct Link {
    incoming: Option<mpsc::Sender<Message>>,
    disconnect: Option<oneshot::Sender<()>>,
}

/// Transport that keeps everything in memory
///
/// Incoming messages are injected with [`push`](Self::push); outgoing ones are
/// recorded and can be awaited with [`wait_for_sent`](Self::wait_for_sent).
pub struct MemoryTransport {
    info: BotInfo,
    owner: Option<String>,
    emojis: HashMap<String, Vec<Emoji>>,
    fail_connect: bool,
    fail_emojis: bool,
    failing_channels: Mutex<HashSet<String>>,
    link: Mutex<Link>,
    sent: Mutex<Vec<SentMessage>>,
    sent_notify: Notify,
    cache: OnceCell<MessageCache>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            info: BotInfo {
                id: "1000".to_string(),
                name: "ultimate-bot".to_string(),
                username: "ultimate_bot".to_string(),
            },
            owner: None,
            emojis: HashMap::new(),
            fail_connect: false,
            fail_emojis: false,
            failing_channels: Mutex::new(HashSet::new()),
            link: Mutex::new(Link::default()),
            sent: Mutex::new(Vec::new()),
            sent_notify: Notify::new(),
            cache: OnceCell::new(),
        }
    }

    pub fn with_info(mut self, info: BotInfo) -> Self {
        self.info = info;
        self
    }

    /// Owner reported by [`Transport::application_owner`]
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner = Some(owner_id.into());
        self
    }

    pub fn with_emojis(mut self, guild_id: impl Into<String>, emojis: Vec<Emoji>) -> Self {
        self.emojis.insert(guild_id.into(), emojis);
        self
    }

    /// Makes every connection attempt fail
    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Makes every emoji lookup fail
    pub fn failing_emojis(mut self) -> Self {
        self.fail_emojis = true;
        self
    }

    /// Makes sends to `channel_id` fail
    pub fn fail_channel(&self, channel_id: impl Into<String>) {
        self.failing_channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(channel_id.into());
    }

    pub fn info(&self) -> &BotInfo {
        &self.info
    }

    pub fn is_connected(&self) -> bool {
        self.link
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .incoming
            .is_some()
    }

    /// Delivers an incoming message to the bot
    pub async fn push(&self, message: Message) -> Result<(), TransportError> {
        let sender = self
            .link
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .incoming
            .clone()
            .ok_or(TransportError::NotConnected)?;
        if let Some(cache) = self.cache.get() {
            cache.push(message.clone());
        }
        sender
            .send(message)
            .await
            .map_err(|_| TransportError::NotConnected)
    }

    /// Shorthand for pushing `content` from `user_id` in `channel_id`
    pub async fn push_text(
        &self,
        channel_id: &str,
        user_id: &str,
        content: &str,
    ) -> Result<(), TransportError> {
        self.push(Message::new(Scope::channel(channel_id), User::new(user_id), content))
            .await
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn sent_to(&self, channel_id: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|m| m.channel_id == channel_id)
            .map(|m| m.text)
            .collect()
    }

    /// Waits until at least `count` messages were sent, or `timeout` elapses.
    /// Returns everything sent so far either way.
    pub async fn wait_for_sent(&self, count: usize, timeout: Duration) -> Vec<SentMessage> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.sent_notify.notified();
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.sent();
            }
        }
    }

    /// Simulates losing the connection
    pub fn disconnect(&self) {
        let mut link = self.link.lock().unwrap_or_else(|e| e.into_inner());
        link.incoming = None;
        if let Some(tx) = link.disconnect.take() {
            let _ = tx.send(());
        }
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, options: ConnectOptions) -> Result<Connection, TransportError> {
        if self.fail_connect {
            return Err(TransportError::Auth("connection refused".to_string()));
        }
        let (incoming_tx, incoming) = mpsc::channel(INCOMING_BUFFER);
        let (disconnect_tx, disconnected) = oneshot::channel();
        {
            let mut link = self.link.lock().unwrap_or_else(|e| e.into_inner());
            link.incoming = Some(incoming_tx);
            link.disconnect = Some(disconnect_tx);
        }
        if let Some(cache) = MessageCache::for_bound(options.message_cache_size) {
            let _ = self.cache.set(cache);
        }
        Ok(Connection {
            info: self.info.clone(),
            incoming,
            disconnected,
        })
    }

    async fn send_message(&self, channel_id: &str, text: &str) -> Result<String, TransportError> {
        let failing = self
            .failing_channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(channel_id);
        if failing {
            return Err(TransportError::ChannelNotFound(channel_id.to_string()));
        }

        let id = {
            let mut sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
            sent.push(SentMessage {
                channel_id: channel_id.to_string(),
                text: text.to_string(),
            });
            sent.len().to_string()
        };
        self.sent_notify.notify_waiters();
        Ok(id)
    }

    async fn application_owner(&self) -> Result<Option<String>, TransportError> {
        Ok(self.owner.clone())
    }

    async fn guild_emojis(&self, guild_id: &str) -> Result<Vec<Emoji>, TransportError> {
        if self.fail_emojis {
            return Err(TransportError::Network(format!("emojis of {} unavailable", guild_id)));
        }
        Ok(self.emojis.get(guild_id).cloned().unwrap_or_default())
    }

    fn recent_messages(&self, channel_id: &str, limit: usize) -> Vec<Message> {
        self.cache
            .get()
            .map(|cache| cache.recent(channel_id, limit))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_push_requires_connection() {
        let transport = MemoryTransport::new();
        assert!(matches!(
            transport.push_text("c", "u", "hi").await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_round_trip_and_disconnect() {
        let transport = MemoryTransport::new();
        let options = ConnectOptions {
            message_cache_size: Some(10),
            ..ConnectOptions::default()
        };
        let mut conn = transport.connect(options).await.unwrap();

        transport.push_text("c", "u", "hello").await.unwrap();
        let received = conn.incoming.recv().await.unwrap();
        assert_eq!(received.content, "hello");
        assert_eq!(transport.recent_messages("c", 5).len(), 1);

        transport.send_message("c", "reply").await.unwrap();
        assert_eq!(transport.sent_to("c"), vec!["reply"]);

        transport.disconnect();
        assert!(conn.disconnected.await.is_ok());
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_failing_channel() {
        let transport = MemoryTransport::new();
        transport.fail_channel("broken");
        assert!(transport.send_message("broken", "x").await.is_err());
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_default_config_caches_nothing() {
        let transport = MemoryTransport::new();
        let options = crate::infrastructure::config::Config::default().connect_options();
        let mut conn = transport.connect(options).await.unwrap();

        for i in 0..5 {
            transport.push_text("c", "u", &format!("m{}", i)).await.unwrap();
            conn.incoming.recv().await.unwrap();
        }
        assert!(transport.recent_messages("c", 10).is_empty());
    }
}
