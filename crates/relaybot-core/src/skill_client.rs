//! HTTP client that delivers activities to skill bots

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::types::{Activity, ChannelAccount};

/// Status and body returned by a skill for a posted activity
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeResponse {
    pub status: u16,
    pub body: Option<Value>,
}

/// Forwarding side of the activity transport
#[async_trait]
pub trait SkillClient: Send + Sync {
    /// Post `activity` to a skill, addressed with `conversation_id` and asking
    /// the skill to answer on `service_url`.
    ///
    /// The activity's `from` stays the user who wrote it. `from_bot_id` names
    /// the root bot as the caller. Calls between bots are not authenticated,
    /// so it is only logged; a token-issuing client would use it as its app id.
    async fn post_activity(
        &self,
        from_bot_id: &str,
        to_bot_id: &str,
        to_url: &str,
        service_url: &str,
        conversation_id: &str,
        activity: &Activity,
    ) -> Result<InvokeResponse>;
}

/// Rewrite an activity so the skill sees its own conversation id and replies
/// to the host endpoint. The original addressing travels in `relatesTo`.
pub fn address_to_skill(
    activity: &Activity,
    to_bot_id: &str,
    service_url: &str,
    conversation_id: &str,
) -> Activity {
    let mut outgoing = activity.clone();
    outgoing.relates_to = Some(activity.conversation_reference());
    outgoing.conversation.id = conversation_id.to_string();
    outgoing.service_url = Some(service_url.to_string());
    outgoing.recipient = ChannelAccount {
        id: to_bot_id.to_string(),
        name: activity.recipient.name.clone(),
        role: Some("skill".to_string()),
    };
    outgoing
}

pub struct HttpSkillClient {
    client: Client,
}

impl std::fmt::Debug for HttpSkillClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSkillClient").finish()
    }
}

impl HttpSkillClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build skill HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SkillClient for HttpSkillClient {
    async fn post_activity(
        &self,
        from_bot_id: &str,
        to_bot_id: &str,
        to_url: &str,
        service_url: &str,
        conversation_id: &str,
        activity: &Activity,
    ) -> Result<InvokeResponse> {
        let outgoing = address_to_skill(activity, to_bot_id, service_url, conversation_id);

        debug!(
            "Posting {} activity from {} to skill {} at {}",
            outgoing.activity_type, from_bot_id, to_bot_id, to_url
        );

        let response = self
            .client
            .post(to_url)
            .json(&outgoing)
            .send()
            .await
            .with_context(|| format!("Failed to post activity to skill at {}", to_url))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(anyhow!(
                "Skill {} rejected activity with status {}: {}",
                to_bot_id,
                status,
                text
            ));
        }

        let body = if text.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&text).ok()
        };

        Ok(InvokeResponse {
            status: status.as_u16(),
            body,
        })
    }
}
