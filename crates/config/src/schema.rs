//! Config schema types (server, database, platform APIs, AI backends, routing).
use std::collections::HashMap;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HandoffConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub meta: MetaConfig,
    pub assistant: AssistantConfig,
    pub sentiment: SentimentConfig,
    pub routing: RoutingConfig,
    pub replies: RepliesConfig,
    pub metrics: MetricsConfig,
    pub admin: AdminConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "0.0.0.0" since the platform must reach it.
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Relational store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL.
    pub url: String,
    pub max_connections: u32,
    /// Upper bound for a single store call, in seconds.
    pub query_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:handoff.db?mode=rwc".into(),
            max_connections: 25,
            query_timeout_secs: 5,
        }
    }
}

/// Facebook/Instagram platform settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaConfig {
    /// App secret used to sign webhook deliveries.
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub app_secret: Option<Secret<String>>,
    /// Token echoed back during the subscription handshake.
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub verify_token: Option<Secret<String>>,
    /// Application id stamped on echoes of messages this router sent.
    pub app_id: String,
    pub graph_base_url: String,
    /// Graph API version for the send endpoint.
    pub send_api_version: String,
    /// Graph API version for profile lookups.
    pub profile_api_version: String,
    pub http_timeout_secs: u64,
}

impl std::fmt::Debug for MetaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaConfig")
            .field("app_secret", &self.app_secret.as_ref().map(|_| "[REDACTED]"))
            .field(
                "verify_token",
                &self.verify_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("app_id", &self.app_id)
            .field("graph_base_url", &self.graph_base_url)
            .field("send_api_version", &self.send_api_version)
            .field("profile_api_version", &self.profile_api_version)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            app_secret: None,
            verify_token: None,
            app_id: "1195277397801905".into(),
            graph_base_url: "https://graph.facebook.com".into(),
            send_api_version: "v19.0".into(),
            profile_api_version: "v23.0".into(),
            http_timeout_secs: 10,
        }
    }
}

/// AI backend (chat-messages API) settings. API keys are per page and live
/// in the page registry, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub base_url: String,
    /// Total attempts on transport failure, first try included.
    pub max_attempts: u32,
    /// Attempt N waits N of these before retrying.
    pub backoff_unit_ms: u64,
    pub timeout_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.dify.ai/v1".into(),
            max_attempts: 3,
            backoff_unit_ms: 1000,
            timeout_secs: 10,
        }
    }
}

/// Intent classifier settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for SentimentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentimentConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.fireworks.ai/inference/v1".into(),
            model: "accounts/fireworks/models/llama4-maverick-instruct-basic".into(),
            temperature: 0.1,
            max_tokens: 10,
            timeout_secs: 15,
        }
    }
}

/// Pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Human-held conversations idle this long are handed back to the bot.
    pub reactivation_after_hours: u64,
    /// Webhook batches waiting for a worker before the receiver sheds load.
    pub queue_capacity: usize,
    /// Batches processed concurrently.
    pub max_in_flight: usize,
    pub profile_ttl_hours: u64,
    /// Lifetime of a bot-echo flag that never sees its echo.
    pub echo_flag_ttl_secs: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            reactivation_after_hours: 12,
            queue_capacity: 1024,
            max_in_flight: 64,
            profile_ttl_hours: 24,
            echo_flag_ttl_secs: 600,
        }
    }
}

/// User-facing copy sent on handoff and failure paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepliesConfig {
    pub need_human: String,
    pub frustrated: String,
    pub fallback: String,
}

impl Default for RepliesConfig {
    fn default() -> Self {
        Self {
            need_human: "Te conectaré con un agente humano en breve. Mientras tanto, puedes seguir escribiendo y un agente te responderá.".into(),
            frustrated: "Entiendo tu frustración. Te estoy conectando con un agente humano que podrá ayudarte mejor.".into(),
            fallback: "Disculpa, estoy teniendo problemas técnicos. Un agente humano te ayudará pronto.".into(),
        }
    }
}

/// Metrics and observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Labels added to every metric.
    pub labels: HashMap<String, String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            labels: HashMap::new(),
        }
    }
}

/// Operator endpoints.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Bearer token required by `/send-message`. Open when unset.
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_token: Option<Secret<String>>,
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
