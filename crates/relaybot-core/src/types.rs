//! Activity types shared by the router, the transports and the gateway

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of an activity as it appears on the wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum ActivityType {
    #[default]
    Message,
    EndOfConversation,
    ConversationUpdate,
    Typing,
    /// Anything this bot has no handler for
    #[serde(other)]
    Other,
}

impl ActivityType {
    /// Parse an activity type from its wire name
    pub fn from_string(s: &str) -> Self {
        match s {
            "message" => Self::Message,
            "endOfConversation" => Self::EndOfConversation,
            "conversationUpdate" => Self::ConversationUpdate,
            "typing" => Self::Typing,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Message => write!(f, "message"),
            Self::EndOfConversation => write!(f, "endOfConversation"),
            Self::ConversationUpdate => write!(f, "conversationUpdate"),
            Self::Typing => write!(f, "typing"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// A user or bot taking part in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl ChannelAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ConversationAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }
}

/// Everything needed to address a message back into an existing conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConversationReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    #[serde(default)]
    pub user: ChannelAccount,
    #[serde(default)]
    pub bot: ChannelAccount,
    #[serde(default)]
    pub conversation: ConversationAccount,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
}

/// A single activity exchanged with a channel or a skill
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type", default)]
    pub activity_type: ActivityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(default)]
    pub from: ChannelAccount,
    #[serde(default)]
    pub recipient: ChannelAccount,
    #[serde(default)]
    pub conversation: ConversationAccount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members_added: Vec<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    /// End-of-conversation code reported by a skill (e.g. "completedSuccessfully")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relates_to: Option<ConversationReference>,
}

impl Activity {
    /// Build a plain text message activity
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            activity_type: ActivityType::Message,
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Text of the activity, empty when none was sent
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Reference to the conversation this activity arrived in
    pub fn conversation_reference(&self) -> ConversationReference {
        ConversationReference {
            activity_id: self.id.clone(),
            user: self.from.clone(),
            bot: self.recipient.clone(),
            conversation: self.conversation.clone(),
            channel_id: self.channel_id.clone(),
            service_url: self.service_url.clone(),
        }
    }

    /// Address a reply to this activity: sender and recipient swap,
    /// conversation and channel carry over.
    pub fn create_reply(&self, text: impl Into<String>) -> Activity {
        Activity {
            activity_type: ActivityType::Message,
            id: None,
            timestamp: Some(Utc::now()),
            channel_id: self.channel_id.clone(),
            service_url: self.service_url.clone(),
            from: self.recipient.clone(),
            recipient: self.from.clone(),
            conversation: self.conversation.clone(),
            text: Some(text.into()),
            members_added: Vec::new(),
            reply_to_id: self.id.clone(),
            code: None,
            relates_to: None,
        }
    }

    /// Re-address this activity into the conversation described by `reference`.
    ///
    /// An incoming activity is made to look like the user sent it to the bot;
    /// an outgoing one comes from the bot and goes to the user.
    pub fn apply_conversation_reference(
        &mut self,
        reference: &ConversationReference,
        is_incoming: bool,
    ) {
        self.channel_id = reference.channel_id.clone();
        self.service_url = reference.service_url.clone();
        self.conversation = reference.conversation.clone();
        if is_incoming {
            self.from = reference.user.clone();
            self.recipient = reference.bot.clone();
        } else {
            self.from = reference.bot.clone();
            self.recipient = reference.user.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_deserialize_wire_names() {
        let json = r#"{
            "type": "endOfConversation",
            "id": "act-1",
            "channelId": "emulator",
            "serviceUrl": "http://localhost:9000",
            "from": {"id": "skill-app"},
            "recipient": {"id": "root-app"},
            "conversation": {"id": "conv-1"},
            "code": "completedSuccessfully",
            "locale": "en-US"
        }"#;
        let activity: Activity = serde_json::from_str(json).unwrap();
        assert_eq!(activity.activity_type, ActivityType::EndOfConversation);
        assert_eq!(activity.conversation.id, "conv-1");
        assert_eq!(activity.service_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(activity.code.as_deref(), Some("completedSuccessfully"));
        assert!(activity.text.is_none());
    }

    #[test]
    fn test_unknown_activity_type() {
        let activity: Activity =
            serde_json::from_str(r#"{"type":"invoke","conversation":{"id":"c"}}"#).unwrap();
        assert_eq!(activity.activity_type, ActivityType::Other);
        assert_eq!(ActivityType::from_string("invoke"), ActivityType::Other);
        assert_eq!(ActivityType::from_string("message"), ActivityType::Message);
    }

    #[test]
    fn test_create_reply_swaps_accounts() {
        let mut incoming = Activity::message("hi");
        incoming.id = Some("a1".to_string());
        incoming.from = ChannelAccount::new("user");
        incoming.recipient = ChannelAccount::new("bot");
        incoming.conversation = ConversationAccount::new("conv");

        let reply = incoming.create_reply("hello");
        assert_eq!(reply.from.id, "bot");
        assert_eq!(reply.recipient.id, "user");
        assert_eq!(reply.conversation.id, "conv");
        assert_eq!(reply.reply_to_id.as_deref(), Some("a1"));
        assert_eq!(reply.text(), "hello");
    }

    #[test]
    fn test_conversation_reference_roundtrip_addressing() {
        let mut incoming = Activity::message("hi");
        incoming.id = Some("a1".to_string());
        incoming.channel_id = "webchat".to_string();
        incoming.service_url = Some("http://channel".to_string());
        incoming.from = ChannelAccount::new("user");
        incoming.recipient = ChannelAccount::new("bot");
        incoming.conversation = ConversationAccount::new("conv");
        let reference = incoming.conversation_reference();
        assert_eq!(reference.user.id, "user");
        assert_eq!(reference.bot.id, "bot");

        let mut from_skill = Activity::message("skill says hi");
        from_skill.from = ChannelAccount::new("skill-app");
        from_skill.recipient = ChannelAccount::new("user");
        from_skill.conversation = ConversationAccount::new("skill-conv-id");
        from_skill.service_url = Some("http://host/api/skills".to_string());
        from_skill.apply_conversation_reference(&reference, false);
        assert_eq!(from_skill.conversation.id, "conv");
        assert_eq!(from_skill.service_url.as_deref(), Some("http://channel"));
        assert_eq!(from_skill.channel_id, "webchat");
        assert_eq!(from_skill.from.id, "bot");
        assert_eq!(from_skill.recipient.id, "user");
    }

    #[test]
    fn test_incoming_reference_replies_reach_the_user() {
        let mut incoming = Activity::message("hi");
        incoming.from = ChannelAccount::new("user");
        incoming.recipient = ChannelAccount::new("bot");
        incoming.conversation = ConversationAccount::new("conv");
        let reference = incoming.conversation_reference();

        let mut eoc = Activity {
            activity_type: ActivityType::EndOfConversation,
            from: ChannelAccount::new("skill-app"),
            conversation: ConversationAccount::new("skill-conv-id"),
            ..Default::default()
        };
        eoc.apply_conversation_reference(&reference, true);
        assert_eq!(eoc.from.id, "user");
        assert_eq!(eoc.recipient.id, "bot");

        let reply = eoc.create_reply("back");
        assert_eq!(reply.from.id, "bot");
        assert_eq!(reply.recipient.id, "user");
        assert_eq!(reply.conversation.id, "conv");
    }

    #[test]
    fn test_missing_text_reads_empty() {
        let activity = Activity::default();
        assert_eq!(activity.text(), "");
    }

    #[test]
    fn test_serialize_skips_empty_fields() {
        let json = serde_json::to_string(&Activity::message("x")).unwrap();
        assert!(json.contains("\"type\":\"message\""));
        assert!(!json.contains("membersAdded"));
        assert!(!json.contains("relatesTo"));
    }
}
