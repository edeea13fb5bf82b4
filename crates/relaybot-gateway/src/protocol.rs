//! HTTP protocol of the gateway: routes, response bodies and errors

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relaybot_core::Activity;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

// ── Routes ──

pub mod routes {
    pub const MESSAGES: &str = "/api/messages";
    pub const SKILL_SEND_TO_CONVERSATION: &str =
        "/api/skills/v3/conversations/{conversation_id}/activities";
    pub const SKILL_REPLY_TO_ACTIVITY: &str =
        "/api/skills/v3/conversations/{conversation_id}/activities/{activity_id}";
    pub const STATUS: &str = "/api/status";
    pub const CONVERSATIONS: &str = "/api/conversations";
}

/// Body returned for an inbound channel activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    /// Replies the router sent during the turn
    pub responses: Vec<Activity>,
}

/// Body returned to a skill for a callback activity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceResponse {
    pub id: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid activity: {0}")]
    InvalidActivity(String),
    #[error("unknown skill conversation '{0}'")]
    UnknownConversation(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidActivity(_) => StatusCode::BAD_REQUEST,
            Self::UnknownConversation(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Turn failed: {:#}", self);
        }
        (
            status,
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Parse a request body into an activity that names its conversation
pub fn parse_activity(body: &str) -> Result<Activity, GatewayError> {
    let activity: Activity = serde_json::from_str(body)
        .map_err(|e| GatewayError::InvalidActivity(format!("invalid JSON: {}", e)))?;
    if activity.conversation.id.is_empty() {
        return Err(GatewayError::InvalidActivity(
            "missing conversation id".to_string(),
        ));
    }
    Ok(activity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_activity() {
        let activity =
            parse_activity(r#"{"type":"message","text":"hi","conversation":{"id":"c1"}}"#).unwrap();
        assert_eq!(activity.text(), "hi");
    }

    #[test]
    fn test_parse_activity_invalid_json() {
        let err = parse_activity("not json").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_parse_activity_requires_conversation() {
        let err = parse_activity(r#"{"type":"message","text":"hi"}"#).unwrap_err();
        assert!(err.to_string().contains("missing conversation id"));
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            GatewayError::UnknownConversation("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_resource_response_serialize() {
        let json = serde_json::to_string(&ResourceResponse { id: "a1".into() }).unwrap();
        assert_eq!(json, r#"{"id":"a1"}"#);
    }
}
