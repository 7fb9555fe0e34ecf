//! Anthropic (Claude) client for the Messages API (`/v1/messages`).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    CompletionClient, ProviderError, build_http_client, map_reqwest_error, map_status_error,
    passthrough_params,
};
use crate::types::{
    ApiResponse, ChatMessage, CompletionOptions, MessageRole, ProviderType, TokenUsage,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const API_BASE: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const TYPED_KEYS: &[&str] = &["model", "max_tokens", "messages", "system", "temperature"];

// ---------------------------------------------------------------------------
// Wire types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    model: String,
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct AnthropicClient {
    api_key: String,
    default_max_tokens: u32,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(
        api_key: String,
        timeout: Duration,
        default_max_tokens: u32,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            api_key,
            default_max_tokens,
            client: build_http_client(timeout)?,
        })
    }

    /// System text comes from `options.system_prompt` when set, otherwise
    /// from the joined `System` messages. Only user/assistant turns go into
    /// `messages`.
    fn build_request(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> AnthropicRequest {
        let from_messages: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect();

        let system = match &options.system_prompt {
            Some(sys) => Some(sys.clone()),
            None if !from_messages.is_empty() => Some(from_messages.join("\n\n")),
            None => None,
        };

        let turns = messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| AnthropicMessage {
                role: m.role.as_str(),
                content: m.content.clone(),
            })
            .collect();

        AnthropicRequest {
            model: model.to_string(),
            max_tokens: options
                .max_tokens
                .filter(|t| *t > 0)
                .unwrap_or(self.default_max_tokens),
            messages: turns,
            system,
            temperature: options.temperature,
            extra: passthrough_params(&options.extra, TYPED_KEYS),
        }
    }

    fn parse_response(
        raw: serde_json::Value,
        latency_ms: u64,
    ) -> Result<ApiResponse, ProviderError> {
        let data: AnthropicResponse = serde_json::from_value(raw.clone())
            .map_err(|e| ProviderError::Other(format!("Failed to parse response: {e}")))?;

        let content: String = data
            .content
            .iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text.as_deref())
            .collect();

        Ok(ApiResponse {
            content,
            model: data.model,
            provider: ProviderType::Anthropic.to_string(),
            usage: TokenUsage {
                input_tokens: data.usage.input_tokens,
                output_tokens: data.usage.output_tokens,
            },
            latency_ms,
            raw_response: Some(raw),
            error: None,
        })
    }
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Anthropic
    }

    async fn complete(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<ApiResponse, ProviderError> {
        let body = self.build_request(model_id, messages, options);

        let started = Instant::now();
        let resp = self
            .client
            .post(API_BASE)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(map_status_error(ProviderType::Anthropic, status, &text));
        }

        let raw: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Other(format!("Failed to parse response: {e}")))?;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        Self::parse_response(raw, latency_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> AnthropicClient {
        AnthropicClient::new("sk-ant-test".into(), Duration::from_secs(5), 4096).unwrap()
    }

    #[test]
    fn build_request_defaults() {
        let req = client().build_request(
            "claude-3-5-sonnet-20240620",
            &[ChatMessage::user("Hello")],
            &CompletionOptions::default(),
        );
        assert_eq!(req.model, "claude-3-5-sonnet-20240620");
        assert_eq!(req.max_tokens, 4096);
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].role, "user");
        assert!(req.system.is_none());
        assert!(req.temperature.is_none());
    }

    #[test]
    fn build_request_system_from_messages() {
        let messages = vec![
            ChatMessage::system("You are helpful."),
            ChatMessage::system("Answer in French."),
            ChatMessage::user("Hi"),
            ChatMessage::new(MessageRole::Assistant, "Bonjour"),
        ];
        let req = client().build_request("claude-3-opus", &messages, &CompletionOptions::default());
        assert_eq!(
            req.system.as_deref(),
            Some("You are helpful.\n\nAnswer in French.")
        );
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[1].role, "assistant");
    }

    #[test]
    fn build_request_explicit_system_prompt_wins() {
        let messages = vec![ChatMessage::system("ignored"), ChatMessage::user("Hi")];
        let options = CompletionOptions {
            system_prompt: Some("explicit".into()),
            max_tokens: Some(256),
            temperature: Some(0.3),
            ..CompletionOptions::default()
        };
        let req = client().build_request("claude-3-opus", &messages, &options);
        assert_eq!(req.system.as_deref(), Some("explicit"));
        assert_eq!(req.max_tokens, 256);
        assert_eq!(req.temperature, Some(0.3));
    }

    #[test]
    fn zero_max_tokens_uses_default() {
        let options = CompletionOptions {
            max_tokens: Some(0),
            ..CompletionOptions::default()
        };
        let req = client().build_request("claude-3-opus", &[ChatMessage::user("x")], &options);
        assert_eq!(req.max_tokens, 4096);
    }

    #[test]
    fn request_serializes_extra_params() {
        let mut options = CompletionOptions::default();
        options.extra.insert("top_k".into(), json!(40));
        let req = client().build_request("claude-3-opus", &[ChatMessage::user("x")], &options);
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["top_k"], json!(40));
        assert!(value.get("system").is_none());
    }

    #[test]
    fn typed_fields_win_over_extra() {
        let mut options = CompletionOptions {
            max_tokens: Some(256),
            ..CompletionOptions::default()
        };
        options.extra.insert("max_tokens".into(), json!(1));
        options.extra.insert("system".into(), json!("from extra"));
        options.extra.insert("top_k".into(), json!(40));
        let req = client().build_request("claude-3-opus", &[ChatMessage::user("x")], &options);

        let text = serde_json::to_string(&req).unwrap();
        assert_eq!(text.matches("\"max_tokens\"").count(), 1);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["max_tokens"], json!(256));
        assert_eq!(value["top_k"], json!(40));
        assert!(value.get("system").is_none());
    }

    #[test]
    fn parse_response_concatenates_text_blocks() {
        let raw = json!({
            "id": "msg_1",
            "type": "message",
            "model": "claude-3-5-sonnet-20240620",
            "content": [
                {"type": "text", "text": "Hello "},
                {"type": "tool_use", "id": "t1", "name": "x", "input": {}},
                {"type": "text", "text": "world"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 4}
        });
        let resp = AnthropicClient::parse_response(raw, 42).unwrap();
        assert_eq!(resp.content, "Hello world");
        assert_eq!(resp.provider, "anthropic");
        assert_eq!(resp.usage.input_tokens, 10);
        assert_eq!(resp.usage.output_tokens, 4);
        assert_eq!(resp.latency_ms, 42);
        assert!(resp.raw_response.is_some());
    }

    #[test]
    fn parse_response_rejects_malformed_body() {
        let err = AnthropicClient::parse_response(json!({"oops": true}), 1).unwrap_err();
        assert!(matches!(err, ProviderError::Other(_)));
    }
}
