use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Task classification
// ---------------------------------------------------------------------------

/// Inferred category of a prompt's intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    CodeGeneration,
    Debugging,
    ArchitecturalDesign,
    Documentation,
    Testing,
    DataAnalysis,
    Reasoning,
    General,
}

impl TaskType {
    pub const ALL: [TaskType; 8] = [
        Self::CodeGeneration,
        Self::Debugging,
        Self::ArchitecturalDesign,
        Self::Documentation,
        Self::Testing,
        Self::DataAnalysis,
        Self::Reasoning,
        Self::General,
    ];

    /// Normalized key used for guidance lookups (`"code_generation"`).
    pub fn key(&self) -> &'static str {
        match self {
            Self::CodeGeneration => "code_generation",
            Self::Debugging => "debugging",
            Self::ArchitecturalDesign => "architectural_design",
            Self::Documentation => "documentation",
            Self::Testing => "testing",
            Self::DataAnalysis => "data_analysis",
            Self::Reasoning => "reasoning",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for TaskType {
    type Err = String;

    /// Accepts `code_generation`, `code-generation`, `Code Generation` and
    /// `CODE_GENERATION`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace([' ', '-'], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.key() == key)
            .ok_or_else(|| format!("unknown task type: {s}"))
    }
}

/// Which tradeoff the caller cares about most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Speed,
    Cost,
    Quality,
    #[default]
    Balanced,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Speed => "speed",
            Self::Cost => "cost",
            Self::Quality => "quality",
            Self::Balanced => "balanced",
        };
        f.write_str(s)
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "speed" => Ok(Self::Speed),
            "cost" => Ok(Self::Cost),
            "quality" => Ok(Self::Quality),
            "balanced" => Ok(Self::Balanced),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// Requirements derived from a single request. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequirements {
    pub task_type: TaskType,
    pub min_context: u32,
    pub require_vision: bool,
    pub require_functions: bool,
    pub priority: Priority,
    /// Maximum blended cost per 1M tokens. Unset by the classifier.
    #[serde(default)]
    pub max_cost: Option<f64>,
    /// Minimum reasoning score (0-100). Unset (0) by the classifier.
    #[serde(default)]
    pub min_reasoning: f64,
    /// Minimum coding score (0-100). Unset (0) by the classifier.
    #[serde(default)]
    pub min_coding: f64,
}

/// Floor for [`TaskRequirements::min_context`].
pub const MIN_CONTEXT_FLOOR: u32 = 4000;

impl TaskRequirements {
    pub fn new(task_type: TaskType) -> Self {
        Self {
            task_type,
            min_context: MIN_CONTEXT_FLOOR,
            require_vision: false,
            require_functions: false,
            priority: Priority::Balanced,
            max_cost: None,
            min_reasoning: 0.0,
            min_coding: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog entries
// ---------------------------------------------------------------------------

/// Provider families a catalog entry can be dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    #[serde(rename = "openai")]
    OpenAI,
    Anthropic,
    Google,
    #[serde(rename = "xai")]
    XAI,
    Ollama,
    Azure,
    Bedrock,
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
            Self::XAI => "xai",
            Self::Ollama => "ollama",
            Self::Azure => "azure",
            Self::Bedrock => "bedrock",
        };
        f.write_str(s)
    }
}

/// Capabilities and pricing of one callable model+provider combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    /// Catalog key used by guidance rules and explicit overrides.
    pub id: String,
    pub name: String,
    /// Model name sent to the provider.
    pub api_name: String,
    pub provider: ProviderType,
    pub context_window: u32,
    /// USD per 1M input tokens.
    pub input_cost: f64,
    /// USD per 1M output tokens.
    pub output_cost: f64,
    /// 0-100
    pub reasoning_score: f64,
    /// 0-100
    pub coding_score: f64,
    /// 0-10
    pub speed_rating: f64,
    #[serde(default)]
    pub supports_vision: bool,
    #[serde(default)]
    pub supports_function_calling: bool,
}

impl ModelCapabilities {
    /// Cost per 1M tokens assuming a 3:1 input:output ratio.
    pub fn blended_cost(&self) -> f64 {
        (self.input_cost * 3.0 + self.output_cost) / 4.0
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }
}

// ---------------------------------------------------------------------------
// Request options
// ---------------------------------------------------------------------------

/// Model-call parameters forwarded to the provider client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Provider-specific parameters merged into the request body as-is.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Caller-supplied options for a single routed request.
#[derive(Debug, Clone, Default)]
pub struct RouteOptions {
    /// Replaces the default single-turn `[user: prompt]` message list.
    pub messages: Option<Vec<ChatMessage>>,
    pub completion: CompletionOptions,
}

impl RouteOptions {
    pub fn with_messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = Some(messages);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.completion.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.completion.max_tokens = Some(max_tokens);
        self
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Standardized response produced by a provider client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub content: String,
    /// Provider-facing model id that served the request.
    pub model: String,
    pub provider: String,
    pub usage: TokenUsage,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_type_parses_common_spellings() {
        for s in [
            "code_generation",
            "code-generation",
            "Code Generation",
            "CODE_GENERATION",
        ] {
            assert_eq!(s.parse::<TaskType>().unwrap(), TaskType::CodeGeneration);
        }
        assert!("translation".parse::<TaskType>().is_err());
    }

    #[test]
    fn task_type_display_matches_key() {
        for t in TaskType::ALL {
            assert_eq!(t.to_string(), t.key());
        }
    }

    #[test]
    fn priority_defaults_to_balanced() {
        assert_eq!(Priority::default(), Priority::Balanced);
        assert_eq!("Quality".parse::<Priority>().unwrap(), Priority::Quality);
    }

    #[test]
    fn blended_cost_weights_input_three_to_one() {
        let model = ModelCapabilities {
            id: "m".into(),
            name: "M".into(),
            api_name: "m".into(),
            provider: ProviderType::OpenAI,
            context_window: 8000,
            input_cost: 4.0,
            output_cost: 8.0,
            reasoning_score: 50.0,
            coding_score: 50.0,
            speed_rating: 5.0,
            supports_vision: false,
            supports_function_calling: false,
        };
        assert!((model.blended_cost() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn provider_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ProviderType::OpenAI).unwrap(),
            "\"openai\""
        );
        assert_eq!(serde_json::to_string(&ProviderType::XAI).unwrap(), "\"xai\"");
        assert_eq!(ProviderType::XAI.to_string(), "xai");
    }

    #[test]
    fn requirements_new_uses_floor() {
        let req = TaskRequirements::new(TaskType::General);
        assert_eq!(req.min_context, MIN_CONTEXT_FLOOR);
        assert_eq!(req.priority, Priority::Balanced);
        assert!(req.max_cost.is_none());
    }
}
