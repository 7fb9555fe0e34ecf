//! Provider clients.
//!
//! The orchestrator talks to every backend through [`CompletionClient`].
//! Clients are created on first use by a [`ClientFactory`] and cached per
//! [`ProviderType`] in a [`ClientRegistry`].

pub mod anthropic;
pub mod openai_compat;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use conductor_core::ConductorConfig;

use crate::types::{ApiResponse, ChatMessage, CompletionOptions, ProviderType};

use anthropic::AnthropicClient;
use openai_compat::{AuthStyle, OpenAiCompatClient};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that any provider may return.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited")]
    RateLimit,

    #[error("Invalid API key")]
    InvalidKey,

    #[error("Model not available: {0}")]
    ModelUnavailable(String),

    #[error("Timeout")]
    Timeout,

    #[error("Provider {0} is not configured")]
    NotConfigured(ProviderType),

    #[error("Provider {0} has no client implementation")]
    Unsupported(ProviderType),

    #[error("Provider error: {0}")]
    Other(String),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Uniform "send messages, get a structured response" contract.
///
/// Implementations must return `Err` (never a sentinel response) on network,
/// auth, or provider-side failures so the caller can fall back.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    fn provider_type(&self) -> ProviderType;

    async fn complete(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<ApiResponse, ProviderError>;
}

/// Builds the client for a provider. Called at most once per provider per
/// [`ClientRegistry`] unless creation fails.
pub trait ClientFactory: Send + Sync {
    fn create(&self, provider: ProviderType) -> Result<Arc<dyn CompletionClient>, ProviderError>;
}

// ---------------------------------------------------------------------------
// ClientRegistry
// ---------------------------------------------------------------------------

/// Lazily-populated, provider-keyed client cache shared by concurrent
/// requests.
pub struct ClientRegistry {
    factory: Arc<dyn ClientFactory>,
    clients: RwLock<HashMap<ProviderType, Arc<dyn CompletionClient>>>,
}

impl ClientRegistry {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Return the cached client for `provider`, creating it on first use.
    ///
    /// Creation happens under the write lock after a second lookup, so
    /// concurrent first uses create exactly one client. Failed creations are
    /// not cached.
    pub fn get_or_create(
        &self,
        provider: ProviderType,
    ) -> Result<Arc<dyn CompletionClient>, ProviderError> {
        if let Some(client) = self.clients.read().get(&provider) {
            return Ok(Arc::clone(client));
        }

        let mut clients = self.clients.write();
        if let Some(client) = clients.get(&provider) {
            return Ok(Arc::clone(client));
        }

        let client = self.factory.create(provider)?;
        debug!(%provider, "Created provider client");
        clients.insert(provider, Arc::clone(&client));
        Ok(client)
    }

    /// Number of providers with a cached client.
    pub fn cached_count(&self) -> usize {
        self.clients.read().len()
    }
}

// ---------------------------------------------------------------------------
// HTTP clients
// ---------------------------------------------------------------------------

const OPENAI_BASE: &str = "https://api.openai.com/v1";
const XAI_BASE: &str = "https://api.x.ai/v1";
const GOOGLE_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Credentials and endpoints for the HTTP clients.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub xai_api_key: Option<String>,
    pub azure_api_key: Option<String>,
    pub azure_endpoint: Option<String>,
    pub ollama_url: String,
    pub timeout: Duration,
    pub default_max_tokens: u32,
}

impl From<&ConductorConfig> for ProviderSettings {
    fn from(config: &ConductorConfig) -> Self {
        Self {
            openai_api_key: config.openai_api_key.clone(),
            anthropic_api_key: config.anthropic_api_key.clone(),
            google_api_key: config.google_api_key.clone(),
            xai_api_key: config.xai_api_key.clone(),
            azure_api_key: config.azure_api_key.clone(),
            azure_endpoint: config.azure_endpoint.clone(),
            ollama_url: config.ollama_url.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
            default_max_tokens: config.default_max_tokens,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Default factory backed by real HTTP clients.
pub struct HttpClientFactory {
    settings: ProviderSettings,
}

impl HttpClientFactory {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }

    fn require_key<'a>(
        provider: ProviderType,
        key: &'a Option<String>,
    ) -> Result<&'a str, ProviderError> {
        non_empty(key).ok_or(ProviderError::NotConfigured(provider))
    }

    fn openai_compat(
        &self,
        provider: ProviderType,
        base_url: &str,
        auth: AuthStyle,
    ) -> Result<Arc<dyn CompletionClient>, ProviderError> {
        let client = OpenAiCompatClient::new(
            provider,
            base_url,
            auth,
            self.settings.timeout,
            self.settings.default_max_tokens,
        )?;
        Ok(Arc::new(client))
    }
}

impl ClientFactory for HttpClientFactory {
    fn create(&self, provider: ProviderType) -> Result<Arc<dyn CompletionClient>, ProviderError> {
        let s = &self.settings;
        match provider {
            ProviderType::OpenAI => {
                let key = Self::require_key(provider, &s.openai_api_key)?;
                self.openai_compat(provider, OPENAI_BASE, AuthStyle::Bearer(key.into()))
            }
            ProviderType::XAI => {
                let key = Self::require_key(provider, &s.xai_api_key)?;
                self.openai_compat(provider, XAI_BASE, AuthStyle::Bearer(key.into()))
            }
            ProviderType::Google => {
                let key = Self::require_key(provider, &s.google_api_key)?;
                self.openai_compat(provider, GOOGLE_BASE, AuthStyle::Bearer(key.into()))
            }
            ProviderType::Azure => {
                let key = Self::require_key(provider, &s.azure_api_key)?;
                let endpoint = non_empty(&s.azure_endpoint)
                    .ok_or(ProviderError::NotConfigured(provider))?;
                self.openai_compat(provider, endpoint, AuthStyle::ApiKeyHeader(key.into()))
            }
            ProviderType::Ollama => {
                if s.ollama_url.trim().is_empty() {
                    return Err(ProviderError::NotConfigured(provider));
                }
                let base = format!("{}/v1", s.ollama_url.trim_end_matches('/'));
                self.openai_compat(provider, &base, AuthStyle::None)
            }
            ProviderType::Anthropic => {
                let key = Self::require_key(provider, &s.anthropic_api_key)?;
                let client = AnthropicClient::new(
                    key.to_string(),
                    self.settings.timeout,
                    self.settings.default_max_tokens,
                )?;
                Ok(Arc::new(client))
            }
            ProviderType::Bedrock => Err(ProviderError::Unsupported(provider)),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared HTTP helpers
// ---------------------------------------------------------------------------

/// Build a `reqwest::Client` with the given timeout.
pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::Other(format!("Failed to build HTTP client: {e}")))
}

/// Map an HTTP status code (and body) to a ProviderError.
pub(crate) fn map_status_error(
    provider: ProviderType,
    status: reqwest::StatusCode,
    body: &str,
) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::InvalidKey,
        404 => ProviderError::ModelUnavailable(truncate_error(body)),
        429 => ProviderError::RateLimit,
        s if s >= 500 => {
            ProviderError::Other(format!("{provider} server error {s}: {}", truncate_error(body)))
        }
        _ => ProviderError::Other(format!(
            "{provider} API error {status}: {}",
            truncate_error(body)
        )),
    }
}

/// Map a reqwest error to a ProviderError.
pub(crate) fn map_reqwest_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else if e.is_connect() {
        ProviderError::Network(format!("Connection failed: {e}"))
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Copy of `extra` without the keys a client sets from typed fields, so
/// the typed values win and no key is serialized twice.
pub(crate) fn passthrough_params(
    extra: &serde_json::Map<String, serde_json::Value>,
    reserved: &[&str],
) -> serde_json::Map<String, serde_json::Value> {
    extra
        .iter()
        .filter(|(k, _)| !reserved.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Extract `error.message` from a JSON error body, or truncate the raw body
/// to keep logs readable.
pub(crate) fn truncate_error(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body)
        && let Some(msg) = value
            .get("error")
            .and_then(|e| e.get("message").or(Some(e)))
            .and_then(|m| m.as_str())
    {
        return msg.to_string();
    }

    if body.chars().count() > 200 {
        let cut: String = body.chars().take(200).collect();
        format!("{cut}...")
    } else {
        body.to_string()
    }
}
