//! Skill callback handling
//!
//! Skills answer on the host endpoint using the skill conversation id they
//! were given. The id is mapped back to the original conversation, then the
//! activity is either relayed to the channel or, for end-of-conversation,
//! run through the router so the conversation returns to the root bot.

use relaybot_core::{Activity, ActivityType};
use tracing::{debug, error, info};

use crate::protocol::{GatewayError, ResourceResponse, parse_activity};
use crate::server::{GatewayState, run_turn};

/// Handle an activity a skill posted to the host endpoint
pub async fn handle_skill_callback(
    state: &GatewayState,
    skill_conversation_id: &str,
    reply_to_activity_id: Option<&str>,
    body: &str,
) -> Result<ResourceResponse, GatewayError> {
    let mut activity = parse_activity(body)?;

    let reference = state
        .id_factory
        .get_conversation_reference(skill_conversation_id)
        .await?
        .ok_or_else(|| GatewayError::UnknownConversation(skill_conversation_id.to_string()))?;

    let response = ResourceResponse {
        id: activity.id.clone().unwrap_or_default(),
    };
    let skill_id = activity.from.id.clone();

    if activity.activity_type == ActivityType::EndOfConversation {
        state
            .id_factory
            .delete_conversation_reference(skill_conversation_id)
            .await?;
        info!(
            "Skill {} ended its conversation in {} (code: {})",
            skill_id,
            reference.conversation.id,
            activity.code.as_deref().unwrap_or("none")
        );
        activity.apply_conversation_reference(&reference, true);
        spawn_end_of_conversation(state.clone(), activity);
        return Ok(response);
    }

    activity.apply_conversation_reference(&reference, false);
    activity.reply_to_id = reply_to_activity_id
        .map(str::to_string)
        .or_else(|| reference.activity_id.clone());

    debug!(
        "Relaying {} from skill {} to {} in conversation {}",
        activity.activity_type, skill_id, activity.recipient.id, activity.conversation.id
    );
    state.connector.send(&activity).await?;
    Ok(response)
}

/// The skill may still be waiting on the forward that holds this
/// conversation's turn lock, so the end-of-conversation turn runs detached.
fn spawn_end_of_conversation(state: GatewayState, activity: Activity) {
    tokio::spawn(async move {
        let conversation = activity.conversation.id.clone();
        if let Err(e) = run_turn(&state, activity).await {
            error!(
                "End-of-conversation turn failed in {}: {:#}",
                conversation, e
            );
        }
    });
}
