//! Incoming message cache shared by adapters

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::domain::entities::Message;

/// Most recent incoming messages across all channels, oldest evicted first
pub struct MessageCache {
    max_size: usize,
    messages: Mutex<VecDeque<Message>>,
}

impl MessageCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            messages: Mutex::new(VecDeque::with_capacity(max_size.min(1024))),
        }
    }

    /// Cache for a transport connection. Without a configured bound nothing is cached.
    pub fn for_bound(max_size: Option<usize>) -> Option<Self> {
        max_size.filter(|max| *max > 0).map(Self::new)
    }

    pub fn push(&self, message: Message) {
        let mut messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        messages.push_back(message);
        while messages.len() > self.max_size {
            messages.pop_front();
        }
    }

    /// Up to `limit` messages from `channel_id`, newest first
    pub fn recent(&self, channel_id: &str, limit: usize) -> Vec<Message> {
        let messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        messages
            .iter()
            .rev()
            .filter(|m| m.channel_id() == channel_id)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Scope, User};

    fn msg(channel: &str, content: &str) -> Message {
        Message::new(Scope::channel(channel), User::new("1"), content)
    }

    #[test]
    fn test_bounded_cache_evicts_oldest() {
        let cache = MessageCache::new(2);
        cache.push(msg("a", "one"));
        cache.push(msg("a", "two"));
        cache.push(msg("a", "three"));

        assert_eq!(cache.len(), 2);
        let recent: Vec<String> = cache.recent("a", 10).into_iter().map(|m| m.content).collect();
        assert_eq!(recent, vec!["three", "two"]);
    }

    #[test]
    fn test_recent_filters_by_channel() {
        let cache = MessageCache::new(10);
        cache.push(msg("a", "one"));
        cache.push(msg("b", "two"));
        cache.push(msg("a", "three"));

        let recent: Vec<String> = cache.recent("a", 1).into_iter().map(|m| m.content).collect();
        assert_eq!(recent, vec!["three"]);
        assert!(cache.recent("c", 5).is_empty());
    }

    #[test]
    fn test_no_bound_means_no_cache() {
        assert!(MessageCache::for_bound(None).is_none());
        assert!(MessageCache::for_bound(Some(0)).is_none());
        assert!(MessageCache::for_bound(Some(3)).is_some());
    }
}
