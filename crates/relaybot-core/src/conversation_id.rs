//! Skill conversation ids
//!
//! A skill never sees the real conversation id. Every forwarded turn gets a
//! fresh opaque id that maps back to the original conversation reference when
//! the skill calls the host endpoint.

use anyhow::Result;
use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::types::ConversationReference;

/// Maximum number of live skill conversation ids (oldest are evicted first)
const MAX_SKILL_CONVERSATIONS: usize = 10_000;

#[async_trait]
pub trait ConversationIdFactory: Send + Sync {
    /// Create a new skill conversation id for `reference`
    async fn create_skill_conversation_id(&self, reference: &ConversationReference)
        -> Result<String>;

    async fn get_conversation_reference(
        &self,
        skill_conversation_id: &str,
    ) -> Result<Option<ConversationReference>>;

    async fn delete_conversation_reference(&self, skill_conversation_id: &str) -> Result<()>;
}

/// In-memory id factory bounded by an LRU
pub struct SkillConversationIdFactory {
    references: Mutex<LruCache<String, ConversationReference>>,
}

impl SkillConversationIdFactory {
    pub fn new() -> Self {
        Self::with_capacity(MAX_SKILL_CONVERSATIONS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            references: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn len(&self) -> usize {
        self.references.lock().await.len()
    }
}

impl Default for SkillConversationIdFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationIdFactory for SkillConversationIdFactory {
    async fn create_skill_conversation_id(
        &self,
        reference: &ConversationReference,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.references
            .lock()
            .await
            .put(id.clone(), reference.clone());
        debug!(
            "Skill conversation id {} -> conversation {}",
            id, reference.conversation.id
        );
        Ok(id)
    }

    async fn get_conversation_reference(
        &self,
        skill_conversation_id: &str,
    ) -> Result<Option<ConversationReference>> {
        Ok(self
            .references
            .lock()
            .await
            .get(skill_conversation_id)
            .cloned())
    }

    async fn delete_conversation_reference(&self, skill_conversation_id: &str) -> Result<()> {
        self.references.lock().await.pop(skill_conversation_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConversationAccount;

    fn reference(conversation: &str) -> ConversationReference {
        ConversationReference {
            conversation: ConversationAccount::new(conversation),
            channel_id: "emulator".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fresh_id_per_call() {
        let factory = SkillConversationIdFactory::new();
        let r = reference("c1");
        let a = factory.create_skill_conversation_id(&r).await.unwrap();
        let b = factory.create_skill_conversation_id(&r).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(factory.len().await, 2);
    }

    #[tokio::test]
    async fn test_resolve_and_delete() {
        let factory = SkillConversationIdFactory::new();
        let id = factory
            .create_skill_conversation_id(&reference("c1"))
            .await
            .unwrap();

        let resolved = factory.get_conversation_reference(&id).await.unwrap().unwrap();
        assert_eq!(resolved.conversation.id, "c1");

        factory.delete_conversation_reference(&id).await.unwrap();
        assert!(factory.get_conversation_reference(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let factory = SkillConversationIdFactory::new();
        assert!(factory.get_conversation_reference("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oldest_evicted() {
        let factory = SkillConversationIdFactory::with_capacity(2);
        let first = factory.create_skill_conversation_id(&reference("c1")).await.unwrap();
        factory.create_skill_conversation_id(&reference("c2")).await.unwrap();
        factory.create_skill_conversation_id(&reference("c3")).await.unwrap();
        assert!(factory.get_conversation_reference(&first).await.unwrap().is_none());
        assert_eq!(factory.len().await, 2);
    }
}
