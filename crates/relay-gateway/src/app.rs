//! Central shared state — passed as `Arc<AppState>` to every HTTP/WS handler
//! and to the router's per-conversation workers. Grounded on the teacher's
//! `AppState`: a flat struct of already-constructed domain handles built
//! once in `new()`, generalized from a single-agent runtime to the set of
//! relay-* domain crates this gateway orchestrates.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use dashmap::DashMap;
use relay_agents::{AgentStore, AnthropicProvider, BuiltInConfig, BuiltInKind, LlmProvider};
use relay_channels::{ChannelManager, InstagramAdapter, MessengerAdapter, WhatsAppCloudAdapter, WhatsAppDeviceAdapter};
use relay_core::config::RelayConfig;
use relay_core::types::{AgentKey, ConversationId};
use relay_handover::HandoverQueue;
use relay_messages::MessageStore;
use relay_nlu::{Classifier, ModelClassifier};
use relay_scheduling::{SchedulingEngine, SchedulingPolicy};
use relay_users::ContactResolver;
use relay_uploads::UploadBroker;
use rusqlite::Connection;
use tokio::sync::mpsc;
use tracing::warn;

use crate::calendar_provider::HttpCalendarProvider;
use crate::llm_null::NullLlmProvider;
use crate::router::RouterJob;

/// Default model passed to every built-in agent when no per-tenant override
/// exists. Custom agents carry their own `provider_label`/model selection
/// (§3a `custom_agents`); built-ins have none, so this is the one place a
/// concrete Anthropic model name is hardcoded.
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const DEFAULT_MAX_TOKENS: u32 = 1024;

pub struct AppState {
    pub config: RelayConfig,
    pub messages: Arc<MessageStore>,
    pub presence: relay_presence::Registry,
    pub uploads: UploadBroker,
    pub nlu: Classifier,
    pub agent_store: AgentStore,
    pub llm: Box<dyn LlmProvider + Send + Sync>,
    pub handovers: HandoverQueue,
    pub scheduling: SchedulingEngine,
    pub channels: ChannelManager,
    pub contacts: ContactResolver,
    pub users_db: Mutex<Connection>,
    /// Consecutive low-confidence classifications per conversation (§4.6
    /// trigger 3: "low confidence... repeated" — two in a row fires).
    pub low_confidence_streak: DashMap<ConversationId, u8>,
    pub router_queues: DashMap<ConversationId, mpsc::Sender<RouterJob>>,
    /// Which agent proposed the slot currently sitting in the scheduling
    /// engine's `Confirming` state for a conversation (§4.7), so the
    /// operator-confirm endpoint can attribute the resulting commitment
    /// without the engine itself tracking agent identity.
    pub scheduling_agent: DashMap<ConversationId, AgentKey>,
}

impl AppState {
    pub async fn new(config: RelayConfig) -> anyhow::Result<Self> {
        let messages = Arc::new(MessageStore::new(open_conn(&config)?)?);
        let presence = relay_presence::Registry::new();
        let uploads = UploadBroker::new(open_conn(&config)?, config.uploads.clone(), messages.clone())?;
        let agent_store = AgentStore::open(open_conn(&config)?)?;
        let handovers = HandoverQueue::open(open_conn(&config)?)?;
        let contacts = ContactResolver::new(open_conn(&config)?)?;

        let users_conn = open_conn(&config)?;
        relay_users::db::init_db(&users_conn)?;
        ensure_system_user(&users_conn)?;

        let nlu = build_classifier(&config);
        let llm = build_llm_provider(&config);

        let calendar_provider = Box::new(HttpCalendarProvider::new(
            config.scheduling.calendar_base_url.clone(),
            config.scheduling.calendar_api_key.clone(),
            Duration::from_millis(config.scheduling.calendar_deadline_ms),
        ));
        let scheduling_policy = SchedulingPolicy {
            working_hour_start: config.scheduling.working_hours_start as u8,
            working_hour_end: config.scheduling.working_hours_end as u8,
            slot_duration_minutes: config.scheduling.slot_duration_minutes as i64,
            lookahead_days: config.scheduling.lookahead_days as i64,
            auto_commit: config.scheduling.auto_commit_default,
        };
        let scheduling = SchedulingEngine::new(open_conn(&config)?, calendar_provider, scheduling_policy)?;

        let mut channels = ChannelManager::new();
        register_channels(&mut channels, &config);
        channels.connect_all().await;

        Ok(Self {
            config,
            messages,
            presence,
            uploads,
            nlu,
            agent_store,
            llm,
            handovers,
            scheduling,
            channels,
            contacts,
            users_db: Mutex::new(users_conn),
            low_confidence_streak: DashMap::new(),
            router_queues: DashMap::new(),
            scheduling_agent: DashMap::new(),
        })
    }

    /// Derive a built-in agent's model/token/auto-commit configuration from
    /// the gateway's own config (§4.5: built-ins have no per-tenant row, so
    /// there's nothing to look up — only the Sdr built-in ever auto-commits,
    /// and only when the deployment's default policy allows it).
    pub fn built_in_agent_config(&self, kind: BuiltInKind) -> BuiltInConfig {
        BuiltInConfig {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            auto_commit: matches!(kind, BuiltInKind::Sdr) && self.config.scheduling.auto_commit_default,
        }
    }
}

fn open_conn(config: &RelayConfig) -> rusqlite::Result<Connection> {
    let conn = Connection::open(&config.database.path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=3000;")?;
    Ok(conn)
}

/// `relay_users::identity::create_user` always mints a fresh `UserId`, so the
/// fixed `"system"` author every bot/agent reply is recorded under (see
/// `router::SYSTEM_USER_ID`) is seeded with a raw insert instead.
fn ensure_system_user(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO users (id, display_name, email, password_hash, role, created_at)
         VALUES (?1, ?2, NULL, NULL, ?3, ?4)",
        rusqlite::params![
            crate::router::SYSTEM_USER_ID,
            "Platform",
            relay_core::types::UserRole::Operator.to_string(),
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn build_classifier(config: &RelayConfig) -> Classifier {
    let deadline = Duration::from_millis(config.nlu.deadline_ms);
    if !config.nlu.model_backed {
        return Classifier::new(None, deadline);
    }
    let model = config.providers.anthropic.as_ref().map(|a| {
        ModelClassifier::new(format!("{}/v1/messages", a.base_url), a.api_key.clone(), DEFAULT_MODEL)
    });
    if model.is_none() {
        warn!("nlu.model_backed is set but no provider credential is configured; falling back to rule-based classification");
    }
    Classifier::new(model, deadline)
}

fn build_llm_provider(config: &RelayConfig) -> Box<dyn LlmProvider + Send + Sync> {
    match &config.providers.anthropic {
        Some(anthropic) => Box::new(AnthropicProvider::new(anthropic.api_key.clone(), anthropic.base_url.clone())),
        None => {
            warn!("no anthropic credential configured; agent replies will always fall back to the apology text");
            Box::new(NullLlmProvider)
        }
    }
}

fn register_channels(channels: &mut ChannelManager, config: &RelayConfig) {
    if let Some(c) = &config.channels.whatsapp_cloud {
        channels.register(Box::new(WhatsAppCloudAdapter::new(c.phone_number_id.clone(), c.access_token.clone())));
    }
    if let Some(c) = &config.channels.whatsapp_device {
        // `WhatsAppDeviceConfig` carries no session id of its own — a device
        // session is paired interactively, so a stable default name is used
        // until the pairing flow (§6a, out of scope) assigns a real one.
        channels.register(Box::new(WhatsAppDeviceAdapter::new(c.bridge_url.clone(), "default")));
    }
    if let Some(c) = &config.channels.instagram {
        channels.register(Box::new(InstagramAdapter::new(c.access_token.clone())));
    }
    if let Some(c) = &config.channels.messenger {
        channels.register(Box::new(MessengerAdapter::new(c.access_token.clone())));
    }
}

/// Assemble the full Axum router (§6 HTTP surface, §6a webhooks, §6 WS
/// real-time surface at `/ws`).
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/v1/auth/register", post(crate::http::auth::register))
        .route("/v1/auth/login", post(crate::http::auth::login))
        .route("/v1/conversations/{peer}/messages", get(crate::http::messages::list_messages))
        .route("/v1/conversations/{peer}/messages", post(crate::http::messages::send_message))
        .route("/v1/conversations/{peer}/read", post(crate::http::messages::mark_read))
        .route("/v1/conversations", get(crate::http::messages::recent_conversations))
        .route("/v1/uploads/grant", post(crate::http::uploads::grant))
        .route("/v1/uploads/confirm", post(crate::http::uploads::confirm))
        .route("/v1/agents/custom", get(crate::http::custom_bots::list))
        .route("/v1/agents/custom", post(crate::http::custom_bots::create))
        .route("/v1/agents/custom/{key}", axum::routing::delete(crate::http::custom_bots::delete))
        .route("/v1/agents/custom/{key}/prompt", post(crate::http::custom_bots::update_prompt))
        .route("/v1/nlu/classify", post(crate::http::nlu::classify))
        .route("/v1/handovers", get(crate::http::handovers::list))
        .route("/v1/handovers/{id}/accept", post(crate::http::handovers::accept))
        .route("/v1/handovers/{id}/in-progress", post(crate::http::handovers::mark_in_progress))
        .route("/v1/handovers/{id}/resolve", post(crate::http::handovers::resolve))
        .route("/v1/handovers/{id}/cancel", post(crate::http::handovers::cancel))
        .route("/v1/calendar/commitments", get(crate::http::calendar::list_commitments))
        .route("/v1/calendar/commitments/{id}", post(crate::http::calendar::update_commitment))
        .route("/v1/calendar/commitments/{id}/cancel", post(crate::http::calendar::cancel_commitment))
        .route("/v1/scheduling/{conversation_id}/confirm", post(crate::http::calendar::confirm_slot))
        .route("/v1/channels", get(crate::http::omni::channel_statuses))
        .route("/v1/omni/send", post(crate::http::omni::send))
        .route("/webhooks/{source}", post(crate::http::webhooks::webhook_handler))
        .route("/ws", get(crate::ws::connection::ws_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::compression::CompressionLayer::new())
}
