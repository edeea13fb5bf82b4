//! Reply side of the activity transport: sends activities back to a channel

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::types::Activity;

/// Delivers an already-addressed activity to the channel it belongs to
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn send(&self, activity: &Activity) -> Result<()>;
}

/// URL a reply is posted to:
/// `{serviceUrl}/v3/conversations/{conversationId}/activities[/{replyToId}]`
pub fn reply_url(activity: &Activity) -> Result<String> {
    let service_url = activity
        .service_url
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("activity has no serviceUrl to reply to"))?;

    let base = format!(
        "{}/v3/conversations/{}/activities",
        service_url.trim_end_matches('/'),
        activity.conversation.id
    );
    Ok(match activity.reply_to_id.as_deref() {
        Some(reply_to) if !reply_to.is_empty() => format!("{}/{}", base, reply_to),
        _ => base,
    })
}

pub struct HttpConnector {
    client: Client,
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build connector HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ChannelConnector for HttpConnector {
    async fn send(&self, activity: &Activity) -> Result<()> {
        let url = reply_url(activity)?;
        debug!("Sending {} activity to {}", activity.activity_type, url);

        let response = self
            .client
            .post(&url)
            .json(activity)
            .send()
            .await
            .with_context(|| format!("Failed to send activity to {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!(
                "Channel rejected activity with status {}: {}",
                status,
                error_text
            ));
        }
        Ok(())
    }
}
