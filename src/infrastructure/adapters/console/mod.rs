//! Console adapter for development/testing

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};

use crate::application::errors::TransportError;
use crate::domain::entities::{Message, Scope, User};
use crate::domain::traits::{BotInfo, Connection, ConnectOptions, Transport};

/// Channel every console line is posted in
pub const CONSOLE_CHANNEL: &str = "console";
/// The local user; owns the bot
pub const CONSOLE_USER: &str = "console-user";

/// Console bot adapter for local development
///
/// Each stdin line is an incoming message. End of input disconnects.
pub struct ConsoleAdapter {
    info: BotInfo,
}

impl ConsoleAdapter {
    pub fn new() -> Self {
        Self {
            info: BotInfo {
                id: "console".to_string(),
                name: "ultimate-bot".to_string(),
                username: "console".to_string(),
            },
        }
    }
}

impl Default for ConsoleAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ConsoleAdapter {
    async fn connect(&self, options: ConnectOptions) -> Result<Connection, TransportError> {
        tracing::info!("Starting console bot (dev mode)");
        if let Some(activity) = &options.status.activity {
            println!("[STATUS] {:?}: {}", options.status.kind, activity);
        }

        let (tx, incoming) = mpsc::channel(16);
        let (disconnect_tx, disconnected) = oneshot::channel();

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        let author = User::new(CONSOLE_USER).with_username("you");
                        let message = Message::new(Scope::channel(CONSOLE_CHANNEL), author, line);
                        if tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("Failed to read stdin: {}", e);
                        break;
                    }
                }
            }
            tracing::info!("Console input closed");
            let _ = disconnect_tx.send(());
        });

        Ok(Connection {
            info: self.info.clone(),
            incoming,
            disconnected,
        })
    }

    async fn send_message(&self, _channel_id: &str, text: &str) -> Result<String, TransportError> {
        println!("[BOT] {}", text);
        Ok("console_msg".to_string())
    }

    async fn application_owner(&self) -> Result<Option<String>, TransportError> {
        Ok(Some(CONSOLE_USER.to_string()))
    }
}
