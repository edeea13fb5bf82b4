//! Per-conversation routing state and the stores that persist it
//!
//! The router never touches a store directly. It loads a [`ConversationState`]
//! at the start of a turn, reads and mutates the in-memory value, and calls
//! [`ConversationState::save_changes`] whenever the value must be durable.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::types::Activity;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

/// Routing state kept for one conversation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_skill: Option<String>,
}

impl ConversationSession {
    pub fn is_idle(&self) -> bool {
        self.active_skill.is_none()
    }
}

/// Keyed persistence for conversation sessions
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<ConversationSession>>;

    async fn write(&self, key: &str, session: &ConversationSession) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Storage key for the conversation an activity belongs to
pub fn storage_key(activity: &Activity) -> String {
    format!(
        "{}/conversations/{}",
        activity.channel_id, activity.conversation.id
    )
}

/// Session loaded for the duration of one turn
pub struct ConversationState {
    store: Arc<dyn StateStore>,
    key: String,
    session: ConversationSession,
}

impl ConversationState {
    /// Read the session for the activity's conversation (idle if none stored)
    pub async fn load(store: Arc<dyn StateStore>, activity: &Activity) -> Result<Self> {
        let key = storage_key(activity);
        let session = store.read(&key).await?.unwrap_or_default();
        debug!("Loaded state for '{}': {:?}", key, session.active_skill);
        Ok(Self {
            store,
            key,
            session,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn active_skill(&self) -> Option<&str> {
        self.session.active_skill.as_deref()
    }

    pub fn set_active_skill(&mut self, skill_id: impl Into<String>) {
        self.session.active_skill = Some(skill_id.into());
    }

    pub fn clear_active_skill(&mut self) {
        self.session.active_skill = None;
    }

    /// Persist the current value. An idle session deletes the stored entry.
    pub async fn save_changes(&self) -> Result<()> {
        if self.session.is_idle() {
            self.store.delete(&self.key).await?;
        } else {
            self.store.write(&self.key, &self.session).await?;
        }
        debug!("Saved state for '{}': {:?}", self.key, self.session.active_skill);
        Ok(())
    }
}
