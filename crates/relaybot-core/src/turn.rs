//! One inbound turn: its classified kind and the context replies go through

use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use crate::connector::ChannelConnector;
use crate::types::{Activity, ActivityType, ChannelAccount};

/// What the router does with an activity depends only on this classification
#[derive(Debug, Clone, PartialEq)]
pub enum Turn<'a> {
    /// A skill finished and handed the conversation back
    EndOfConversation,
    Message { text: &'a str },
    MembersAdded { members: &'a [ChannelAccount] },
    /// Typing indicators, empty conversation updates, unknown types
    Other,
}

impl<'a> Turn<'a> {
    pub fn classify(activity: &'a Activity) -> Self {
        match activity.activity_type {
            ActivityType::EndOfConversation => Turn::EndOfConversation,
            ActivityType::Message => Turn::Message {
                text: activity.text(),
            },
            ActivityType::ConversationUpdate if !activity.members_added.is_empty() => {
                Turn::MembersAdded {
                    members: &activity.members_added,
                }
            }
            _ => Turn::Other,
        }
    }
}

/// Inbound activity plus the means to answer it
pub struct TurnContext {
    activity: Activity,
    connector: Arc<dyn ChannelConnector>,
    responses: Vec<Activity>,
}

impl TurnContext {
    pub fn new(activity: Activity, connector: Arc<dyn ChannelConnector>) -> Self {
        Self {
            activity,
            connector,
            responses: Vec::new(),
        }
    }

    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    /// Send a text reply into the turn's conversation
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        let reply = self.activity.create_reply(text);
        debug!(
            "Reply in conversation {}: {}",
            reply.conversation.id,
            text.chars().take(100).collect::<String>()
        );
        self.connector.send(&reply).await?;
        self.responses.push(reply);
        Ok(())
    }

    /// Replies sent so far during this turn
    pub fn responses(&self) -> &[Activity] {
        &self.responses
    }

    pub fn into_responses(self) -> Vec<Activity> {
        self.responses
    }
}
