//! Conversation registry — one turn at a time per conversation

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, warn};

/// Conversations remembered before idle ones are forgotten (least recent first)
const MAX_CONVERSATIONS: usize = 10_000;

/// What the gateway knows about a conversation it has seen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationInfo {
    pub key: String,
    pub first_seen: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub turn_count: u64,
}

struct Slot {
    info: ConversationInfo,
    turn_lock: Arc<Mutex<()>>,
}

impl Slot {
    fn new(key: &str) -> Self {
        let now = Utc::now();
        Self {
            info: ConversationInfo {
                key: key.to_string(),
                first_seen: now,
                last_activity: now,
                turn_count: 0,
            },
            turn_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Nobody holds or waits on the turn lock
    fn is_idle(&self) -> bool {
        Arc::strong_count(&self.turn_lock) == 1
    }
}

/// Tracks conversations and serializes their turns
pub struct ConversationRegistry {
    conversations: RwLock<LruCache<String, Slot>>,
    capacity: usize,
}

impl Default for ConversationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationRegistry {
    pub fn new() -> Self {
        Self::with_capacity(MAX_CONVERSATIONS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            conversations: RwLock::new(LruCache::unbounded()),
            capacity: capacity.max(1),
        }
    }

    /// Wait until no other turn of this conversation is running, then record
    /// the turn. The conversation stays locked until the guard is dropped.
    pub async fn begin_turn(&self, key: &str) -> OwnedMutexGuard<()> {
        let turn_lock = {
            let mut conversations = self.conversations.write().await;
            let existing = conversations.get(key).map(|slot| slot.turn_lock.clone());
            match existing {
                Some(turn_lock) => turn_lock,
                None => {
                    let slot = Slot::new(key);
                    let turn_lock = slot.turn_lock.clone();
                    conversations.put(key.to_string(), slot);
                    self.evict_idle(&mut conversations);
                    turn_lock
                }
            }
        };

        let guard = turn_lock.lock_owned().await;

        // Holding the guard keeps the slot from being evicted
        let mut conversations = self.conversations.write().await;
        if let Some(slot) = conversations.get_mut(key) {
            slot.info.last_activity = Utc::now();
            slot.info.turn_count += 1;
            debug!(
                "Conversation '{}' turn {}",
                key, slot.info.turn_count
            );
        }
        guard
    }

    /// Drop the least recently used idle conversations until back under
    /// capacity. Conversations with a turn running or queued are kept.
    fn evict_idle(&self, conversations: &mut LruCache<String, Slot>) {
        while conversations.len() > self.capacity {
            let idle = conversations
                .iter()
                .rev()
                .find(|(_, slot)| slot.is_idle())
                .map(|(key, _)| key.clone());
            match idle {
                Some(key) => {
                    conversations.pop(&key);
                    debug!("Forgot idle conversation '{}'", key);
                }
                None => {
                    warn!(
                        "{} conversations busy, registry over capacity {}",
                        conversations.len(),
                        self.capacity
                    );
                    break;
                }
            }
        }
    }

    /// All conversations, most recently active first
    pub async fn list(&self) -> Vec<ConversationInfo> {
        let conversations = self.conversations.read().await;
        let mut list: Vec<ConversationInfo> =
            conversations.iter().map(|(_, s)| s.info.clone()).collect();
        list.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        list
    }

    pub async fn get(&self, key: &str) -> Option<ConversationInfo> {
        let conversations = self.conversations.read().await;
        conversations.peek(key).map(|s| s.info.clone())
    }

    pub async fn count(&self) -> usize {
        self.conversations.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_begin_turn_records_activity() {
        let registry = ConversationRegistry::new();
        drop(registry.begin_turn("c1").await);
        drop(registry.begin_turn("c1").await);
        let info = registry.get("c1").await.unwrap();
        assert_eq!(info.turn_count, 2);
        assert_eq!(registry.count().await, 1);
        assert!(registry.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_same_conversation_is_serialized() {
        let registry = Arc::new(ConversationRegistry::new());
        let guard = registry.begin_turn("c1").await;

        let r = registry.clone();
        let waiter = tokio::spawn(async move {
            let _guard = r.begin_turn("c1").await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());
        assert_eq!(registry.get("c1").await.unwrap().turn_count, 1);

        drop(guard);
        waiter.await.unwrap();
        assert_eq!(registry.get("c1").await.unwrap().turn_count, 2);
    }

    #[tokio::test]
    async fn test_other_conversations_are_not_blocked() {
        let registry = ConversationRegistry::new();
        let _guard = registry.begin_turn("c1").await;
        let other = tokio::time::timeout(Duration::from_secs(1), registry.begin_turn("c2")).await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn test_list_sorted_by_activity() {
        let registry = ConversationRegistry::new();
        drop(registry.begin_turn("older").await);
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(registry.begin_turn("newer").await);

        let list = registry.list().await;
        assert_eq!(list[0].key, "newer");
    }

    #[tokio::test]
    async fn test_idle_conversations_are_evicted_oldest_first() {
        let registry = ConversationRegistry::with_capacity(2);
        drop(registry.begin_turn("c1").await);
        drop(registry.begin_turn("c2").await);
        drop(registry.begin_turn("c1").await);
        drop(registry.begin_turn("c3").await);

        assert_eq!(registry.count().await, 2);
        assert!(registry.get("c2").await.is_none());
        assert_eq!(registry.get("c1").await.unwrap().turn_count, 2);
        assert!(registry.get("c3").await.is_some());
    }

    #[tokio::test]
    async fn test_eviction_keeps_locked_conversations() {
        let registry = Arc::new(ConversationRegistry::with_capacity(1));
        let guard = registry.begin_turn("busy").await;

        // A turn queued behind the running one also pins the slot
        let r = registry.clone();
        let waiter = tokio::spawn(async move {
            let _guard = r.begin_turn("busy").await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(registry.begin_turn("c1").await);
        drop(registry.begin_turn("c2").await);
        assert!(registry.get("busy").await.is_some());
        assert!(registry.get("c1").await.is_none());

        drop(guard);
        waiter.await.unwrap();
        assert_eq!(registry.get("busy").await.unwrap().turn_count, 2);

        // Once idle it can go like any other
        drop(registry.begin_turn("c3").await);
        assert!(registry.get("busy").await.is_none());
        assert_eq!(registry.count().await, 1);
    }
}
