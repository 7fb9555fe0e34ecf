//! OpenAI-compatible `/chat/completions` client.
//!
//! OpenAI, xAI, Google (OpenAI endpoint), Ollama (`/v1`) and Azure OpenAI
//! (v1 API) all accept the same request body, so one client serves them,
//! configured with a base URL and an auth style.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    CompletionClient, ProviderError, build_http_client, map_reqwest_error, map_status_error,
    passthrough_params,
};
use crate::types::{ApiResponse, ChatMessage, CompletionOptions, ProviderType, TokenUsage};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Body keys set from typed options; never taken from `extra`.
const TYPED_KEYS: &[&str] = &[
    "model",
    "messages",
    "max_tokens",
    "max_completion_tokens",
    "temperature",
];

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// How the client authenticates.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer(String),
    /// `api-key: <key>` (Azure)
    ApiKeyHeader(String),
    /// Local servers.
    None,
}

pub struct OpenAiCompatClient {
    provider: ProviderType,
    base_url: String,
    auth: AuthStyle,
    default_max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(
        provider: ProviderType,
        base_url: &str,
        auth: AuthStyle,
        timeout: Duration,
        default_max_tokens: u32,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            provider,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            default_max_tokens,
            client: build_http_client(timeout)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Reasoning models (o1, o3, o4) reject `temperature` and take
    /// `max_completion_tokens` instead of `max_tokens`.
    fn is_reasoning_model(model: &str) -> bool {
        model.starts_with("o1") || model.starts_with("o3") || model.starts_with("o4")
    }

    fn build_body(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> ChatCompletionRequest {
        let is_reasoning = Self::is_reasoning_model(model);
        let max_tokens = options
            .max_tokens
            .filter(|t| *t > 0)
            .unwrap_or(self.default_max_tokens);

        let mut wire = Vec::with_capacity(messages.len() + 1);
        if let Some(sys) = options.system_prompt.as_deref() {
            wire.push(WireMessage {
                role: "system",
                content: sys.to_string(),
            });
        }
        wire.extend(messages.iter().map(|m| WireMessage {
            role: m.role.as_str(),
            content: m.content.clone(),
        }));

        ChatCompletionRequest {
            model: model.to_string(),
            messages: wire,
            max_tokens: (!is_reasoning).then_some(max_tokens),
            max_completion_tokens: is_reasoning.then_some(max_tokens),
            temperature: if is_reasoning {
                None
            } else {
                options.temperature
            },
            extra: passthrough_params(&options.extra, TYPED_KEYS),
        }
    }

    fn parse_response(
        &self,
        model: &str,
        raw: serde_json::Value,
        latency_ms: u64,
    ) -> Result<ApiResponse, ProviderError> {
        let data: ChatCompletionResponse = serde_json::from_value(raw.clone())
            .map_err(|e| ProviderError::Other(format!("JSON parse error: {e}")))?;

        let choice = data.choices.first().ok_or_else(|| {
            ProviderError::Other(format!("No choices in {} response", self.provider))
        })?;

        let usage = data
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens.unwrap_or(0),
                output_tokens: u.completion_tokens.unwrap_or(0),
            })
            .unwrap_or_default();

        Ok(ApiResponse {
            content: choice.message.content.clone().unwrap_or_default(),
            model: data.model.unwrap_or_else(|| model.to_string()),
            provider: self.provider.to_string(),
            usage,
            latency_ms,
            raw_response: Some(raw),
            error: None,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    fn provider_type(&self) -> ProviderType {
        self.provider
    }

    async fn complete(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<ApiResponse, ProviderError> {
        let body = self.build_body(model_id, messages, options);
        let url = format!("{}/chat/completions", self.base_url);

        let mut req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        req = match &self.auth {
            AuthStyle::Bearer(key) => req.header("Authorization", format!("Bearer {key}")),
            AuthStyle::ApiKeyHeader(key) => req.header("api-key", key),
            AuthStyle::None => req,
        };

        let started = Instant::now();
        let resp = req.send().await.map_err(map_reqwest_error)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(map_status_error(self.provider, status, &text));
        }

        let raw: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Other(format!("JSON parse error: {e}")))?;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        self.parse_response(model_id, raw, latency_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(provider: ProviderType) -> OpenAiCompatClient {
        OpenAiCompatClient::new(
            provider,
            "https://api.example.com/v1/",
            AuthStyle::Bearer("sk-test".into()),
            Duration::from_secs(5),
            4096,
        )
        .unwrap()
    }

    fn messages() -> Vec<ChatMessage> {
        vec![ChatMessage::user("Hello")]
    }

    #[test]
    fn base_url_is_trimmed() {
        assert_eq!(client(ProviderType::OpenAI).base_url(), "https://api.example.com/v1");
    }

    #[test]
    fn build_body_standard_model() {
        let options = CompletionOptions {
            temperature: Some(0.2),
            ..CompletionOptions::default()
        };
        let body = client(ProviderType::OpenAI).build_body("gpt-4o", &messages(), &options);
        assert_eq!(body.model, "gpt-4o");
        assert_eq!(body.max_tokens, Some(4096));
        assert!(body.max_completion_tokens.is_none());
        assert_eq!(body.temperature, Some(0.2));
        assert_eq!(body.messages.len(), 1);
        assert_eq!(body.messages[0].role, "user");
    }

    #[test]
    fn build_body_reasoning_model() {
        let options = CompletionOptions {
            temperature: Some(0.7),
            max_tokens: Some(2000),
            ..CompletionOptions::default()
        };
        let body = client(ProviderType::OpenAI).build_body("o1-pro", &messages(), &options);
        assert!(body.max_tokens.is_none());
        assert_eq!(body.max_completion_tokens, Some(2000));
        assert!(body.temperature.is_none());
    }

    #[test]
    fn build_body_prepends_system_prompt() {
        let options = CompletionOptions {
            system_prompt: Some("Be terse.".into()),
            ..CompletionOptions::default()
        };
        let body = client(ProviderType::XAI).build_body("grok-3", &messages(), &options);
        assert_eq!(body.messages.len(), 2);
        assert_eq!(body.messages[0].role, "system");
        assert_eq!(body.messages[0].content, "Be terse.");
    }

    #[test]
    fn extra_params_are_flattened() {
        let mut options = CompletionOptions::default();
        options.extra.insert("top_p".into(), json!(0.9));
        options.extra.insert("seed".into(), json!(42));
        let body = client(ProviderType::Ollama).build_body("qwen2.5:32b", &messages(), &options);

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["top_p"], json!(0.9));
        assert_eq!(value["seed"], json!(42));
        assert_eq!(value["model"], json!("qwen2.5:32b"));
        assert!(value.get("temperature").is_none());
    }

    #[test]
    fn typed_fields_win_over_extra() {
        let mut options = CompletionOptions {
            max_tokens: Some(1000),
            ..CompletionOptions::default()
        };
        options.extra.insert("temperature".into(), json!(0.9));
        options.extra.insert("model".into(), json!("gpt-4o"));
        options.extra.insert("max_completion_tokens".into(), json!(5));
        options.extra.insert("reasoning_effort".into(), json!("high"));
        let body = client(ProviderType::OpenAI).build_body("o3-mini", &messages(), &options);

        let text = serde_json::to_string(&body).unwrap();
        assert_eq!(text.matches("\"model\"").count(), 1);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["model"], json!("o3-mini"));
        assert_eq!(value["max_completion_tokens"], json!(1000));
        assert_eq!(value["reasoning_effort"], json!("high"));
        assert!(value.get("temperature").is_none());
    }

    #[test]
    fn zero_max_tokens_uses_default() {
        let options = CompletionOptions {
            max_tokens: Some(0),
            ..CompletionOptions::default()
        };
        let openai = client(ProviderType::OpenAI);
        assert_eq!(openai.build_body("gpt-4o", &messages(), &options).max_tokens, Some(4096));
        assert_eq!(
            openai.build_body("o1-pro", &messages(), &options).max_completion_tokens,
            Some(4096)
        );
    }

    #[test]
    fn parse_response_extracts_content_and_usage() {
        let raw = json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-2024-08-06",
            "choices": [{"message": {"role": "assistant", "content": "Hi!"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        });
        let resp = client(ProviderType::OpenAI)
            .parse_response("gpt-4o", raw.clone(), 120)
            .unwrap();

        assert_eq!(resp.content, "Hi!");
        assert_eq!(resp.model, "gpt-4o-2024-08-06");
        assert_eq!(resp.provider, "openai");
        assert_eq!(resp.usage.input_tokens, 12);
        assert_eq!(resp.usage.output_tokens, 3);
        assert_eq!(resp.latency_ms, 120);
        assert_eq!(resp.raw_response, Some(raw));
        assert!(resp.error.is_none());
    }

    #[test]
    fn parse_response_defaults_model_and_usage() {
        let raw = json!({"choices": [{"message": {"content": null}}]});
        let resp = client(ProviderType::Ollama)
            .parse_response("qwen2.5:32b", raw, 5)
            .unwrap();
        assert_eq!(resp.model, "qwen2.5:32b");
        assert_eq!(resp.content, "");
        assert_eq!(resp.usage, TokenUsage::default());
    }

    #[test]
    fn parse_response_without_choices_is_error() {
        let err = client(ProviderType::Google)
            .parse_response("gemini-2.5-pro", json!({"choices": []}), 1)
            .unwrap_err();
        assert!(matches!(err, ProviderError::Other(m) if m.contains("google")));
    }
}
