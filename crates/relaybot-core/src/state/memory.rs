//! Process-local state store

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{ConversationSession, StateStore};

/// In-memory store. Sessions are kept serialized so reads never alias writes.
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl StateStore for MemoryStorage {
    async fn read(&self, key: &str) -> Result<Option<ConversationSession>> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(json) => Ok(Some(
                serde_json::from_str(json).context("Failed to decode stored session")?,
            )),
            None => Ok(None),
        }
    }

    async fn write(&self, key: &str, session: &ConversationSession) -> Result<()> {
        let json = serde_json::to_string(session)?;
        self.entries.write().await.insert(key.to_string(), json);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_read_delete() {
        let store = MemoryStorage::new();
        let session = ConversationSession {
            active_skill: Some("SkillBot".to_string()),
        };
        store.write("k", &session).await.unwrap();
        assert_eq!(store.read("k").await.unwrap(), Some(session));
        assert_eq!(store.len().await, 1);

        store.delete("k").await.unwrap();
        assert!(store.read("k").await.unwrap().is_none());
        // Deleting a missing key is fine
        store.delete("k").await.unwrap();
    }
}
