use std::sync::Arc;

use tracing::warn;

use crate::domain::traits::Transport;

/// Posts operational messages to the configured debug-log channel
pub struct DebugLog {
    transport: Arc<dyn Transport>,
    channel_id: Option<String>,
}

impl DebugLog {
    pub fn new(transport: Arc<dyn Transport>, channel_id: Option<String>) -> Self {
        Self {
            transport,
            channel_id,
        }
    }

    /// Delivery failures are logged and otherwise ignored.
    pub async fn log(&self, message: &str) {
        let Some(channel_id) = &self.channel_id else {
            return;
        };
        if let Err(e) = self.transport.send_message(channel_id, message).await {
            warn!("Failed to send a message to log channel: {}: {}", message, e);
        }
    }
}
