//! Guidance rules: human-curated routing overrides.
//!
//! A [`GuidanceRules`] value holds per-task preferred endpoint lists,
//! per-task fallback chains and a block list. It is built once (usually by
//! [`parser::load_guide`]) and only read afterwards.

pub mod parser;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

pub use parser::{load_guide, parse_guide};

/// Normalize a task name for lookup: lower-case, spaces become underscores.
pub fn normalize_task_key(task: &str) -> String {
    task.trim().to_lowercase().replace(' ', "_")
}

/// Parsed routing overrides. Absent keys are valid and mean "no rule".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidanceRules {
    task_mappings: HashMap<String, Vec<String>>,
    fallback_chains: HashMap<String, Vec<String>>,
    blocked_models: HashSet<String>,
}

impl GuidanceRules {
    /// Empty rule set: every lookup misses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules used when no guide file is available.
    pub fn builtin() -> Self {
        Self::new()
            .with_preferred(
                "code_generation",
                ["codellama:34b", "magicoder:7b", "grok-code-fast-1"],
            )
            .with_preferred(
                "reasoning",
                ["o1-pro", "grok-4-fast-reasoning", "gemini-2.5-pro"],
            )
            .with_preferred(
                "translation",
                ["qwen2.5-32b-instruct", "qwen3:8b", "gemini-2.5-flash"],
            )
            .with_blocked("llama3.2")
    }

    // -- builders --

    pub fn with_preferred<I, S>(mut self, task: &str, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_preferred(task, models);
        self
    }

    pub fn with_fallback<I, S>(mut self, task: &str, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_fallback(task, models);
        self
    }

    pub fn with_blocked(mut self, model_id: impl Into<String>) -> Self {
        self.block(model_id);
        self
    }

    pub(crate) fn set_preferred<I, S>(&mut self, task: &str, models: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.task_mappings.insert(
            normalize_task_key(task),
            models.into_iter().map(Into::into).collect(),
        );
    }

    pub(crate) fn set_fallback<I, S>(&mut self, task: &str, models: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_chains.insert(
            normalize_task_key(task),
            models.into_iter().map(Into::into).collect(),
        );
    }

    pub(crate) fn block(&mut self, model_id: impl Into<String>) {
        self.blocked_models.insert(model_id.into());
    }

    // -- lookups --

    /// Preferred endpoints for a task, in authored priority order.
    pub fn preferred_for(&self, task: &str) -> &[String] {
        self.task_mappings
            .get(&normalize_task_key(task))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Fallback chain for a task, in try order.
    pub fn fallback_for(&self, task: &str) -> &[String] {
        self.fallback_chains
            .get(&normalize_task_key(task))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_blocked(&self, model_id: &str) -> bool {
        self.blocked_models.contains(model_id)
    }

    pub fn blocked(&self) -> impl Iterator<Item = &str> {
        self.blocked_models.iter().map(String::as_str)
    }

    /// Task keys that have a preferred list.
    pub fn mapped_tasks(&self) -> impl Iterator<Item = &str> {
        self.task_mappings.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.task_mappings.is_empty()
            && self.fallback_chains.is_empty()
            && self.blocked_models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_and_underscores() {
        assert_eq!(normalize_task_key("Code Generation"), "code_generation");
        assert_eq!(normalize_task_key("CODE_GENERATION"), "code_generation");
        assert_eq!(normalize_task_key("  reasoning "), "reasoning");
    }

    #[test]
    fn lookups_normalize_keys() {
        let rules = GuidanceRules::new()
            .with_preferred("Code Generation", ["a", "b"])
            .with_fallback("Data Analysis", ["c"]);

        assert_eq!(rules.preferred_for("code_generation"), ["a", "b"]);
        assert_eq!(rules.preferred_for("CODE_GENERATION"), ["a", "b"]);
        assert_eq!(rules.fallback_for("data analysis"), ["c"]);
    }

    #[test]
    fn absent_keys_return_empty() {
        let rules = GuidanceRules::new();
        assert!(rules.preferred_for("testing").is_empty());
        assert!(rules.fallback_for("testing").is_empty());
        assert!(!rules.is_blocked("gpt-4o"));
        assert!(rules.is_empty());
    }

    #[test]
    fn builtin_rules() {
        let rules = GuidanceRules::builtin();
        assert_eq!(
            rules.preferred_for("code_generation"),
            ["codellama:34b", "magicoder:7b", "grok-code-fast-1"]
        );
        assert_eq!(rules.preferred_for("reasoning")[0], "o1-pro");
        assert!(rules.is_blocked("llama3.2"));
        assert!(rules.fallback_for("reasoning").is_empty());
    }

    #[test]
    fn json_roundtrip_preserves_rules() {
        let rules = GuidanceRules::builtin().with_fallback("debugging", ["gpt-4o", "grok-3"]);
        let json = serde_json::to_string(&rules).unwrap();
        let back: GuidanceRules = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rules);
    }
}
