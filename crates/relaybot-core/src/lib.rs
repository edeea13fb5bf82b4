//! relaybot-core - routing logic of the relaybot root bot
//!
//! This crate provides:
//! - Activity types exchanged with channels and skills
//! - The turn router that decides between replying and forwarding to a skill
//! - Conversation state stores (in-memory and SQLite)
//! - Skill conversation id mapping for the skill callback path
//! - HTTP clients for forwarding to skills and replying to channels

pub mod connector;
pub mod conversation_id;
pub mod router;
pub mod skill_client;
pub mod skills;
pub mod state;
pub mod turn;
pub mod types;

// Re-export main types for convenience
pub use connector::{ChannelConnector, HttpConnector};
pub use conversation_id::{ConversationIdFactory, SkillConversationIdFactory};
pub use router::{RootBot, RouterSettings};
pub use skill_client::{HttpSkillClient, InvokeResponse, SkillClient};
pub use skills::{SkillDescriptor, SkillError, SkillsTable};
pub use state::{ConversationSession, ConversationState, MemoryStorage, SqliteStorage, StateStore};
pub use turn::{Turn, TurnContext};
pub use types::{Activity, ActivityType, ChannelAccount, ConversationAccount, ConversationReference};
