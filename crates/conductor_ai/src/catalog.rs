//! Capability catalog: every known endpoint with its capabilities and costs.
//!
//! The built-in table is a static; a [`ModelCatalog`] is a plain value built
//! from it (optionally merged with entries from a JSON file) and handed to the
//! orchestrator at construction.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use tracing::{debug, info};

use crate::types::{ModelCapabilities, ProviderType};

// ---------------------------------------------------------------------------
// Built-in data
// ---------------------------------------------------------------------------

/// All built-in endpoints. Order matters: it is the ranking tie-break.
pub static BUILTIN_MODELS: Lazy<Vec<ModelCapabilities>> = Lazy::new(|| {
    vec![
        // ---- xAI ----
        ModelCapabilities {
            id: "grok-4-fast-reasoning".into(),
            name: "Grok 4 Fast Reasoning".into(),
            api_name: "grok-4-fast-reasoning".into(),
            provider: ProviderType::XAI,
            context_window: 2_000_000,
            input_cost: 2.0,
            output_cost: 6.0,
            reasoning_score: 95.0,
            coding_score: 85.0,
            speed_rating: 7.0,
            supports_vision: false,
            supports_function_calling: true,
        },
        ModelCapabilities {
            id: "grok-code-fast-1".into(),
            name: "Grok Code Fast 1".into(),
            api_name: "grok-code-fast-1".into(),
            provider: ProviderType::XAI,
            context_window: 256_000,
            input_cost: 1.5,
            output_cost: 4.5,
            reasoning_score: 85.0,
            coding_score: 90.0,
            speed_rating: 8.0,
            supports_vision: false,
            supports_function_calling: false,
        },
        ModelCapabilities {
            id: "grok-3".into(),
            name: "Grok 3".into(),
            api_name: "grok-3".into(),
            provider: ProviderType::XAI,
            context_window: 131_072,
            input_cost: 1.0,
            output_cost: 3.0,
            reasoning_score: 80.0,
            coding_score: 75.0,
            speed_rating: 6.0,
            supports_vision: false,
            supports_function_calling: false,
        },
        // ---- OpenAI ----
        ModelCapabilities {
            id: "o1-pro".into(),
            name: "O1 Pro".into(),
            api_name: "o1-pro".into(),
            provider: ProviderType::OpenAI,
            context_window: 200_000,
            input_cost: 60.0,
            output_cost: 240.0,
            reasoning_score: 99.0,
            coding_score: 98.0,
            speed_rating: 3.0,
            supports_vision: false,
            supports_function_calling: false,
        },
        ModelCapabilities {
            id: "gpt-4o".into(),
            name: "GPT-4o".into(),
            api_name: "gpt-4o".into(),
            provider: ProviderType::OpenAI,
            context_window: 128_000,
            input_cost: 5.0,
            output_cost: 15.0,
            reasoning_score: 90.0,
            coding_score: 85.0,
            speed_rating: 8.0,
            supports_vision: true,
            supports_function_calling: true,
        },
        // ---- Google ----
        ModelCapabilities {
            id: "gemini-2.5-pro".into(),
            name: "Gemini 2.5 Pro".into(),
            api_name: "gemini-2.5-pro".into(),
            provider: ProviderType::Google,
            context_window: 1_000_000,
            input_cost: 1.25,
            output_cost: 5.0,
            reasoning_score: 85.0,
            coding_score: 85.0,
            speed_rating: 7.0,
            supports_vision: true,
            supports_function_calling: true,
        },
        ModelCapabilities {
            id: "gemini-2.5-flash".into(),
            name: "Gemini 2.5 Flash".into(),
            api_name: "gemini-2.5-flash".into(),
            provider: ProviderType::Google,
            context_window: 1_000_000,
            input_cost: 0.075,
            output_cost: 0.3,
            reasoning_score: 80.0,
            coding_score: 80.0,
            speed_rating: 9.0,
            supports_vision: true,
            supports_function_calling: true,
        },
        // ---- Anthropic ----
        ModelCapabilities {
            id: "claude-3-5-sonnet".into(),
            name: "Claude 3.5 Sonnet".into(),
            api_name: "claude-3-5-sonnet-20240620".into(),
            provider: ProviderType::Anthropic,
            context_window: 200_000,
            input_cost: 3.0,
            output_cost: 15.0,
            reasoning_score: 95.0,
            coding_score: 95.0,
            speed_rating: 7.0,
            supports_vision: true,
            supports_function_calling: true,
        },
        ModelCapabilities {
            id: "claude-3-opus".into(),
            name: "Claude 3 Opus".into(),
            api_name: "claude-3-opus-20240229".into(),
            provider: ProviderType::Anthropic,
            context_window: 200_000,
            input_cost: 15.0,
            output_cost: 75.0,
            reasoning_score: 98.0,
            coding_score: 92.0,
            speed_rating: 5.0,
            supports_vision: true,
            supports_function_calling: true,
        },
        // ---- Local (Ollama) ----
        ModelCapabilities {
            id: "codellama:34b".into(),
            name: "CodeLlama 34B".into(),
            api_name: "codellama:34b".into(),
            provider: ProviderType::Ollama,
            context_window: 16_384,
            input_cost: 0.0,
            output_cost: 0.0,
            reasoning_score: 85.0,
            coding_score: 95.0,
            speed_rating: 5.0,
            supports_vision: false,
            supports_function_calling: false,
        },
        ModelCapabilities {
            id: "qwen2.5:32b".into(),
            name: "Qwen 2.5 32B".into(),
            api_name: "qwen2.5:32b-instruct-q4_K_M".into(),
            provider: ProviderType::Ollama,
            context_window: 32_768,
            input_cost: 0.0,
            output_cost: 0.0,
            reasoning_score: 88.0,
            coding_score: 85.0,
            speed_rating: 6.0,
            supports_vision: false,
            supports_function_calling: true,
        },
    ]
});

// ---------------------------------------------------------------------------
// ModelCatalog
// ---------------------------------------------------------------------------

/// Immutable, ordered table of endpoints keyed by catalog id.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: Vec<ModelCapabilities>,
    index: HashMap<String, usize>,
}

impl ModelCatalog {
    /// Build a catalog from entries in iteration order. A repeated id
    /// replaces the earlier entry in place.
    pub fn new(models: impl IntoIterator<Item = ModelCapabilities>) -> Self {
        let mut catalog = Self::default();
        catalog.merge(models);
        catalog
    }

    /// The built-in catalog.
    pub fn builtin() -> Self {
        Self::new(BUILTIN_MODELS.iter().cloned())
    }

    /// Return a copy of `self` with `extra` merged in.
    pub fn with_models(mut self, extra: impl IntoIterator<Item = ModelCapabilities>) -> Self {
        self.merge(extra);
        self
    }

    /// Merge entries loaded from a JSON array file into `self`.
    pub fn with_json_file(self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog: {}", path.display()))?;
        let extra: Vec<ModelCapabilities> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog: {}", path.display()))?;
        info!(
            count = extra.len(),
            "Loaded catalog entries from {}",
            path.display()
        );
        Ok(self.with_models(extra))
    }

    fn merge(&mut self, models: impl IntoIterator<Item = ModelCapabilities>) {
        for model in models {
            match self.index.get(&model.id) {
                Some(&pos) => {
                    debug!(model = %model.id, "Replacing catalog entry");
                    self.models[pos] = model;
                }
                None => {
                    self.index.insert(model.id.clone(), self.models.len());
                    self.models.push(model);
                }
            }
        }
    }

    /// Look up an endpoint by catalog id.
    pub fn get(&self, id: &str) -> Option<&ModelCapabilities> {
        self.index.get(id).map(|&pos| &self.models[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// All endpoints in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &ModelCapabilities> {
        self.models.iter()
    }

    /// Endpoints served by one provider, in catalog order.
    pub fn by_provider(&self, provider: ProviderType) -> Vec<&ModelCapabilities> {
        self.models.iter().filter(|m| m.provider == provider).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
