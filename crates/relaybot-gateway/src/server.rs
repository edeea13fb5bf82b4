//! Gateway HTTP server — Axum-based channel and skill endpoints

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use relaybot_core::state::storage_key;
use relaybot_core::{Activity, ChannelConnector, ConversationIdFactory, RootBot, TurnContext};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::protocol::{GatewayError, MessagesResponse, parse_activity, routes};
use crate::session::ConversationRegistry;
use crate::skill_handler::handle_skill_callback;

/// Shared state for all requests
#[derive(Clone)]
pub struct GatewayState {
    pub bot: Arc<RootBot>,
    pub id_factory: Arc<dyn ConversationIdFactory>,
    pub connector: Arc<dyn ChannelConnector>,
    pub conversations: Arc<ConversationRegistry>,
    pub start_time: std::time::Instant,
}

impl GatewayState {
    pub fn new(
        bot: Arc<RootBot>,
        id_factory: Arc<dyn ConversationIdFactory>,
        connector: Arc<dyn ChannelConnector>,
    ) -> Self {
        Self {
            bot,
            id_factory,
            connector,
            conversations: Arc::new(ConversationRegistry::new()),
            start_time: std::time::Instant::now(),
        }
    }
}

/// The gateway server
pub struct GatewayServer {
    state: GatewayState,
    bind: SocketAddr,
}

impl GatewayServer {
    pub fn new(bind: SocketAddr, state: GatewayState) -> Self {
        Self { state, bind }
    }

    /// Get a reference to the conversation registry
    pub fn conversations(&self) -> &Arc<ConversationRegistry> {
        &self.state.conversations
    }

    /// Build the Axum router
    pub fn router(&self) -> Router {
        Router::new()
            .route(routes::MESSAGES, post(messages_handler))
            .route(routes::SKILL_SEND_TO_CONVERSATION, post(send_to_conversation_handler))
            .route(routes::SKILL_REPLY_TO_ACTIVITY, post(reply_to_activity_handler))
            .route(routes::STATUS, get(status_handler))
            .route(routes::CONVERSATIONS, get(conversations_handler))
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Serve until `shutdown` resolves
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(self.bind).await?;
        info!("Gateway listening on {}", self.bind);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Gateway stopped");
        Ok(())
    }
}

/// Run one turn for `activity` while holding its conversation's turn lock
pub async fn run_turn(state: &GatewayState, activity: Activity) -> anyhow::Result<Vec<Activity>> {
    let _turn = state.conversations.begin_turn(&storage_key(&activity)).await;
    let mut ctx = TurnContext::new(activity, state.connector.clone());
    state.bot.on_turn(&mut ctx).await?;
    Ok(ctx.into_responses())
}

pub async fn handle_incoming(
    state: &GatewayState,
    body: &str,
) -> Result<MessagesResponse, GatewayError> {
    let activity = parse_activity(body)?;
    info!(
        "{} activity from {} in conversation {}",
        activity.activity_type, activity.from.id, activity.conversation.id
    );
    let responses = run_turn(state, activity).await?;
    Ok(MessagesResponse { responses })
}

// ── HTTP Handlers ──

async fn messages_handler(
    State(state): State<GatewayState>,
    body: String,
) -> Result<impl IntoResponse, GatewayError> {
    let response = handle_incoming(&state, &body).await?;
    Ok(axum::Json(response))
}

async fn send_to_conversation_handler(
    State(state): State<GatewayState>,
    Path(conversation_id): Path<String>,
    body: String,
) -> Result<impl IntoResponse, GatewayError> {
    let response = handle_skill_callback(&state, &conversation_id, None, &body).await?;
    Ok(axum::Json(response))
}

async fn reply_to_activity_handler(
    State(state): State<GatewayState>,
    Path((conversation_id, activity_id)): Path<(String, String)>,
    body: String,
) -> Result<impl IntoResponse, GatewayError> {
    let response =
        handle_skill_callback(&state, &conversation_id, Some(&activity_id), &body).await?;
    Ok(axum::Json(response))
}

async fn status_handler(State(state): State<GatewayState>) -> impl IntoResponse {
    let conversations = state.conversations.count().await;
    let uptime = state.start_time.elapsed().as_secs();
    let skills = state.bot.skills();

    axum::Json(serde_json::json!({
        "status": "ok",
        "conversations": conversations,
        "uptime_secs": uptime,
        "host_endpoint": skills.host_endpoint(),
        "default_skill": state.bot.settings().default_skill,
        "skills": skills.list(),
    }))
}

async fn conversations_handler(State(state): State<GatewayState>) -> impl IntoResponse {
    let conversations = state.conversations.list().await;
    axum::Json(serde_json::json!({ "conversations": conversations }))
}
