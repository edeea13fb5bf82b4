//! Root bot turn router
//!
//! Each conversation is either idle or engaged with one skill. An engaged
//! conversation has every message forwarded to that skill until the skill
//! sends end-of-conversation. An idle conversation engages the default skill
//! when the user says the trigger word.
//!
//! State is always saved before a turn is forwarded, so whatever the skill
//! sends back through the host endpoint observes the current value.

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

use crate::conversation_id::ConversationIdFactory;
use crate::skill_client::SkillClient;
use crate::skills::{SkillError, SkillsTable};
use crate::state::{ConversationState, StateStore};
use crate::turn::{Turn, TurnContext};

pub const BACK_IN_ROOT: &str = "Back in the root bot. Say \"skill\" and I'll patch you through";
pub const CONNECTING: &str = "Got it, connecting you to the skill...";
pub const NOT_UNDERSTOOD: &str = "Me no nothin'. Say \"skill\" and I'll patch you through";
pub const WELCOME: &str = "Hello and welcome!";

/// Router settings taken from the `[bot]` config section
#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// This bot's app id, sent as the sender of forwarded activities
    pub bot_id: String,
    /// Substring that engages the default skill
    pub trigger: String,
    pub default_skill: String,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            bot_id: String::new(),
            trigger: "skill".to_string(),
            default_skill: "SkillBot".to_string(),
        }
    }
}

pub struct RootBot {
    settings: RouterSettings,
    skills: Arc<SkillsTable>,
    store: Arc<dyn StateStore>,
    id_factory: Arc<dyn ConversationIdFactory>,
    client: Arc<dyn SkillClient>,
}

impl RootBot {
    /// Fails if the default skill is missing from the table
    pub fn new(
        settings: RouterSettings,
        skills: Arc<SkillsTable>,
        store: Arc<dyn StateStore>,
        id_factory: Arc<dyn ConversationIdFactory>,
        client: Arc<dyn SkillClient>,
    ) -> Result<Self, SkillError> {
        skills.get(&settings.default_skill)?;
        Ok(Self {
            settings,
            skills,
            store,
            id_factory,
            client,
        })
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    pub fn skills(&self) -> &SkillsTable {
        &self.skills
    }

    /// Handle one turn
    pub async fn on_turn(&self, ctx: &mut TurnContext) -> Result<()> {
        let activity = ctx.activity().clone();
        match Turn::classify(&activity) {
            Turn::EndOfConversation => self.on_end_of_conversation(ctx).await,
            Turn::Message { text } => self.on_message(ctx, text).await,
            Turn::MembersAdded { members } => {
                for member in members {
                    if member.id != activity.recipient.id {
                        ctx.send_text(WELCOME).await?;
                    }
                }
                Ok(())
            }
            Turn::Other => {
                debug!(
                    "Ignoring {} activity in conversation {}",
                    activity.activity_type, activity.conversation.id
                );
                Ok(())
            }
        }
    }

    async fn on_end_of_conversation(&self, ctx: &mut TurnContext) -> Result<()> {
        let mut state = ConversationState::load(self.store.clone(), ctx.activity()).await?;
        let activity = ctx.activity();
        info!(
            "End of conversation from {} (code: {}), was routed to {:?}",
            activity.from.id,
            activity.code.as_deref().unwrap_or("none"),
            state.active_skill()
        );

        state.clear_active_skill();
        state.save_changes().await?;

        ctx.send_text(BACK_IN_ROOT).await
    }

    async fn on_message(&self, ctx: &mut TurnContext, text: &str) -> Result<()> {
        let mut state = ConversationState::load(self.store.clone(), ctx.activity()).await?;

        if let Some(skill_id) = state.active_skill().map(str::to_string) {
            state.save_changes().await?;
            return self.forward_to_skill(ctx, &skill_id).await;
        }

        if text.contains(&self.settings.trigger) {
            ctx.send_text(CONNECTING).await?;

            state.set_active_skill(self.settings.default_skill.clone());
            state.save_changes().await?;

            let skill_id = self.settings.default_skill.clone();
            return self.forward_to_skill(ctx, &skill_id).await;
        }

        ctx.send_text(NOT_UNDERSTOOD).await
    }

    async fn forward_to_skill(&self, ctx: &TurnContext, skill_id: &str) -> Result<()> {
        let skill = self.skills.get(skill_id)?;
        let activity = ctx.activity();

        let skill_conversation_id = self
            .id_factory
            .create_skill_conversation_id(&activity.conversation_reference())
            .await?;

        info!(
            "Forwarding {} in conversation {} to skill {}",
            activity.activity_type, activity.conversation.id, skill.id
        );

        self.client
            .post_activity(
                &self.settings.bot_id,
                &skill.app_id,
                &skill.skill_endpoint,
                self.skills.host_endpoint(),
                &skill_conversation_id,
                activity,
            )
            .await?;
        Ok(())
    }
}
