use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const MAX_WS_PAYLOAD_BYTES: usize = 256 * 1024;
pub const HANDSHAKE_TIMEOUT_MS: u64 = 10_000;
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Upper bound on a presigned upload credential's lifetime (§4.3).
pub const MAX_UPLOAD_CREDENTIAL_SECS: u64 = 10 * 60;

/// Top-level config (relay.toml + RELAY_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub nlu: NluConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub handover: HandoverConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub webhooks: WebhooksConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig {
                port: DEFAULT_PORT,
                bind: DEFAULT_BIND.to_string(),
                auth_token_secret: "change-me".to_string(),
                token_ttl_secs: 7 * 24 * 3600,
            },
            database: DatabaseConfig::default(),
            providers: ProvidersConfig::default(),
            nlu: NluConfig::default(),
            scheduling: SchedulingConfig::default(),
            uploads: UploadsConfig::default(),
            handover: HandoverConfig::default(),
            channels: ChannelsConfig::default(),
            webhooks: WebhooksConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// HMAC key used to sign bearer credentials (§3 Identity).
    pub auth_token_secret: String,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// LLM providers available to the Agent Registry (§4.5). Built-in agents use
/// `default_provider`; custom agents carry their own credential handle which
/// is resolved against one of these slots by label at call time.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub anthropic: Option<AnthropicConfig>,
    pub openai: Option<OpenAiConfig>,
    #[serde(default = "default_provider_label")]
    pub default_provider: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    pub api_key: String,
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

/// NLU Classifier configuration (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NluConfig {
    /// When true and a model provider is configured, model-backed
    /// classification is attempted before the rule-based fallback.
    #[serde(default)]
    pub model_backed: bool,
    #[serde(default = "default_nlu_deadline_ms")]
    pub deadline_ms: u64,
    #[serde(default = "default_low_confidence_threshold")]
    pub low_confidence_threshold: f64,
}

impl Default for NluConfig {
    fn default() -> Self {
        Self {
            model_backed: false,
            deadline_ms: default_nlu_deadline_ms(),
            low_confidence_threshold: default_low_confidence_threshold(),
        }
    }
}

/// Scheduling Sub-Protocol configuration (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    #[serde(default = "default_working_hours_start")]
    pub working_hours_start: u32,
    #[serde(default = "default_working_hours_end")]
    pub working_hours_end: u32,
    #[serde(default = "default_slot_duration_minutes")]
    pub slot_duration_minutes: u32,
    #[serde(default = "default_lookahead_days")]
    pub lookahead_days: u32,
    /// Default `auto_commit` vs `require_operator_ok` when an agent row does
    /// not override it (Open Question §9, resolved per-(tenant, agent)).
    #[serde(default)]
    pub auto_commit_default: bool,
    #[serde(default = "default_calendar_deadline_ms")]
    pub calendar_deadline_ms: u64,
    /// Base URL of the external calendar provider (§1 "SMTP/calendar
    /// provider" — an external collaborator with a defined contract but no
    /// specified internals). `None` means no calendar is wired up; the
    /// provider adapter then fails `Unavailable` for every operation.
    #[serde(default)]
    pub calendar_base_url: Option<String>,
    #[serde(default)]
    pub calendar_api_key: Option<String>,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            working_hours_start: default_working_hours_start(),
            working_hours_end: default_working_hours_end(),
            slot_duration_minutes: default_slot_duration_minutes(),
            lookahead_days: default_lookahead_days(),
            auto_commit_default: false,
            calendar_deadline_ms: default_calendar_deadline_ms(),
            calendar_base_url: None,
            calendar_api_key: None,
        }
    }
}

/// Upload Broker configuration (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    #[serde(default = "default_max_upload_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
    #[serde(default = "default_upload_credential_secs")]
    pub credential_ttl_secs: u64,
    pub presign_secret: String,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_upload_bytes(),
            allowed_mime_types: default_allowed_mime_types(),
            credential_ttl_secs: default_upload_credential_secs(),
            presign_secret: "change-me".to_string(),
        }
    }
}

/// Handover Queue configuration (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoverConfig {
    /// Whether bots may keep serving customers outside working hours.
    #[serde(default = "bool_true")]
    pub bot_only_out_of_hours: bool,
    #[serde(default = "default_last_n_messages")]
    pub context_snapshot_messages: usize,
}

impl Default for HandoverConfig {
    fn default() -> Self {
        Self {
            bot_only_out_of_hours: true,
            context_snapshot_messages: default_last_n_messages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelsConfig {
    pub whatsapp_cloud: Option<WhatsAppCloudConfig>,
    pub whatsapp_device: Option<WhatsAppDeviceConfig>,
    pub instagram: Option<MetaChannelConfig>,
    pub messenger: Option<MetaChannelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppCloudConfig {
    pub phone_number_id: String,
    pub access_token: String,
    #[serde(default = "default_graph_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppDeviceConfig {
    /// Base URL of the device-session bridge process.
    pub bridge_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaChannelConfig {
    pub page_id: String,
    pub access_token: String,
    #[serde(default = "default_graph_base_url")]
    pub base_url: String,
}

/// Authentication mode for an incoming webhook source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WebhookAuthMode {
    HmacSha256,
    BearerToken,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSourceConfig {
    /// Identifier used in the route, e.g. "whatsapp" → POST /webhooks/whatsapp.
    pub name: String,
    pub secret: Option<String>,
    pub auth_mode: WebhookAuthMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WebhooksConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub sources: Vec<WebhookSourceConfig>,
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_token_ttl() -> u64 {
    7 * 24 * 3600
}
fn default_provider_label() -> String {
    "anthropic".to_string()
}
fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_graph_base_url() -> String {
    "https://graph.facebook.com/v19.0".to_string()
}
fn default_nlu_deadline_ms() -> u64 {
    4_000
}
fn default_low_confidence_threshold() -> f64 {
    0.5
}
fn default_working_hours_start() -> u32 {
    9
}
fn default_working_hours_end() -> u32 {
    18
}
fn default_slot_duration_minutes() -> u32 {
    60
}
fn default_lookahead_days() -> u32 {
    14
}
fn default_calendar_deadline_ms() -> u64 {
    8_000
}
fn default_max_upload_bytes() -> u64 {
    25 * 1024 * 1024
}
fn default_allowed_mime_types() -> Vec<String> {
    vec![
        "image/png".to_string(),
        "image/jpeg".to_string(),
        "image/webp".to_string(),
        "audio/ogg".to_string(),
        "audio/mpeg".to_string(),
        "audio/wav".to_string(),
        "application/pdf".to_string(),
    ]
}
fn default_upload_credential_secs() -> u64 {
    MAX_UPLOAD_CREDENTIAL_SECS
}
fn default_last_n_messages() -> usize {
    20
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.relay/relay.db")
}
fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.relay/relay.toml")
}

impl RelayConfig {
    /// Load config from a TOML file with RELAY_* env var overrides.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: RelayConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("RELAY_").split("_"))
            .extract()
            .map_err(|e| crate::error::RelayError::Internal(format!("config: {e}")))?;

        Ok(config)
    }
}
