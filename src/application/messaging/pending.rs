//! Pending replies - open interactive follow-ups, at most one per (channel, user)

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

/// Cancels an interactive follow-up
pub type CancelFn = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ReplyKey {
    channel_id: String,
    user_id: String,
}

impl ReplyKey {
    fn new(channel_id: &str, user_id: &str) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            user_id: user_id.to_string(),
        }
    }
}

struct PendingEntry {
    id: u64,
    cancel: CancelFn,
}

/// Registry of open interactive follow-ups
///
/// Entries are removed under the lock and their cancel function runs after it
/// is released, so a cancel function may itself touch the registry.
#[derive(Default)]
pub struct PendingReplyRegistry {
    entries: Mutex<HashMap<ReplyKey, PendingEntry>>,
    next_id: AtomicU64,
}

impl PendingReplyRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ReplyKey, PendingEntry>> {
        // Entries stay consistent even if a holder panicked.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Opens a follow-up for `(channel_id, user_id)`, cancelling any prior one.
    pub fn open<F>(self: &Arc<Self>, channel_id: &str, user_id: &str, cancel: F) -> PendingReply
    where
        F: FnOnce() + Send + 'static,
    {
        let key = ReplyKey::new(channel_id, user_id);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let previous = self.entries().insert(
            key.clone(),
            PendingEntry {
                id,
                cancel: Box::new(cancel),
            },
        );
        if let Some(previous) = previous {
            debug!(channel = %channel_id, user = %user_id, "Replacing open pending reply");
            (previous.cancel)();
        }
        PendingReply {
            key,
            id,
            registry: Arc::clone(self),
        }
    }

    /// Cancels the follow-up for `(channel_id, user_id)` if one is open.
    /// Returns whether a cancel function ran.
    pub fn cancel_if_present(&self, channel_id: &str, user_id: &str) -> bool {
        let removed = self.entries().remove(&ReplyKey::new(channel_id, user_id));
        match removed {
            Some(entry) => {
                debug!(channel = %channel_id, user = %user_id, "Cancelling pending reply");
                (entry.cancel)();
                true
            }
            None => false,
        }
    }

    pub fn is_open(&self, channel_id: &str, user_id: &str) -> bool {
        self.entries().contains_key(&ReplyKey::new(channel_id, user_id))
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove_if_current(&self, key: &ReplyKey, id: u64) -> bool {
        let mut entries = self.entries();
        if entries.get(key).map_or(false, |e| e.id == id) {
            entries.remove(key);
            true
        } else {
            false
        }
    }
}

/// Handle to an open follow-up, held by the plugin that opened it
pub struct PendingReply {
    key: ReplyKey,
    id: u64,
    registry: Arc<PendingReplyRegistry>,
}

impl PendingReply {
    pub fn channel_id(&self) -> &str {
        &self.key.channel_id
    }

    pub fn user_id(&self) -> &str {
        &self.key.user_id
    }

    /// Whether this follow-up is still the open one for its key
    pub fn is_open(&self) -> bool {
        self.registry
            .entries()
            .get(&self.key)
            .map_or(false, |e| e.id == self.id)
    }

    /// Closes the follow-up without running its cancel function, e.g. when
    /// the user answered or it timed out. A newer follow-up for the same key
    /// is left untouched. Returns whether this follow-up was still open.
    pub fn complete(self) -> bool {
        self.registry.remove_if_current(&self.key, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_cancel_if_present_runs_once() {
        let registry = PendingReplyRegistry::new();
        let (count, cancel) = counter();
        let _reply = registry.open("c1", "x", cancel);

        assert!(registry.cancel_if_present("c1", "x"));
        assert!(!registry.cancel_if_present("c1", "x"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_open_replaces_and_cancels_prior() {
        let registry = PendingReplyRegistry::new();
        let (first, cancel_first) = counter();
        let (second, cancel_second) = counter();

        let old = registry.open("c1", "x", cancel_first);
        let new = registry.open("c1", "x", cancel_second);

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
        assert!(!old.is_open());
        assert!(new.is_open());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_other_keys_unaffected() {
        let registry = PendingReplyRegistry::new();
        let (x, cancel_x) = counter();
        let (y, cancel_y) = counter();
        let (other_channel, cancel_other) = counter();

        let _rx = registry.open("c1", "x", cancel_x);
        let ry = registry.open("c1", "y", cancel_y);
        let ro = registry.open("c2", "x", cancel_other);

        assert!(registry.cancel_if_present("c1", "x"));
        assert_eq!(x.load(Ordering::SeqCst), 1);
        assert_eq!(y.load(Ordering::SeqCst), 0);
        assert_eq!(other_channel.load(Ordering::SeqCst), 0);
        assert!(ry.is_open());
        assert!(ro.is_open());
    }

    #[test]
    fn test_complete_leaves_newer_reply_alone() {
        let registry = PendingReplyRegistry::new();
        let (_, cancel_first) = counter();
        let (second, cancel_second) = counter();

        let old = registry.open("c1", "x", cancel_first);
        let _new = registry.open("c1", "x", cancel_second);

        assert!(!old.complete());
        assert!(registry.is_open("c1", "x"));
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_complete_does_not_cancel() {
        let registry = PendingReplyRegistry::new();
        let (count, cancel) = counter();
        let reply = registry.open("c1", "x", cancel);

        assert!(reply.complete());
        assert!(!registry.cancel_if_present("c1", "x"));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_fn_may_reenter_registry() {
        let registry = PendingReplyRegistry::new();
        let inner = Arc::clone(&registry);
        let _reply = registry.open("c1", "x", move || {
            inner.cancel_if_present("c1", "y");
        });
        assert!(registry.cancel_if_present("c1", "x"));
    }
}
