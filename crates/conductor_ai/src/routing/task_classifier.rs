//! Task Classifier
//!
//! Maps a free-text prompt to a [`TaskType`] and the requirements derived
//! from it. Classification is a keyword scan over data tables, so the rules
//! can be swapped out and tested without an orchestrator.
//!
//! Two scans with different tie-break semantics run over the prompt:
//!
//! - **task type**: every category is scored by how many of its keywords
//!   appear; the strictly greatest count wins and ties keep the category
//!   declared first.
//! - **priority**: categories are checked in a fixed precedence order
//!   (speed, cost, quality) and the first one with any hit wins.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{MIN_CONTEXT_FLOOR, Priority, TaskRequirements, TaskType};

// ---------------------------------------------------------------------------
// Rule tables
// ---------------------------------------------------------------------------

/// Task keywords in declaration order (the tie-break order).
pub const TASK_KEYWORDS: &[(TaskType, &[&str])] = &[
    (
        TaskType::CodeGeneration,
        &["write", "implement", "create", "code", "function", "class", "script"],
    ),
    (
        TaskType::Debugging,
        &["debug", "fix", "error", "bug", "troubleshoot", "exception", "fail"],
    ),
    (
        TaskType::Reasoning,
        &["think", "reason", "analyze", "solve", "deduce", "why", "how"],
    ),
    (
        TaskType::ArchitecturalDesign,
        &["design", "architect", "structure", "system", "pattern"],
    ),
    (
        TaskType::Documentation,
        &["document", "docstring", "readme", "explain", "comment"],
    ),
    (
        TaskType::Testing,
        &["test", "unit", "integration", "pytest", "mock"],
    ),
    (
        TaskType::DataAnalysis,
        &["data", "analyze", "csv", "plot", "chart", "trend"],
    ),
];

/// Priority keywords in precedence order.
pub const PRIORITY_KEYWORDS: &[(Priority, &[&str])] = &[
    (Priority::Speed, &["fast", "quick"]),
    (Priority::Cost, &["cheap", "cost"]),
    (Priority::Quality, &["best", "quality", "complex"]),
];

pub const VISION_KEYWORDS: &[&str] = &["image", "picture", "screenshot", "visual"];

pub const FUNCTION_KEYWORDS: &[&str] = &["function", "api", "tool", "call"];

/// Estimated context tokens per prompt character.
pub const CONTEXT_PER_CHAR: u32 = 10;

// ---------------------------------------------------------------------------
// ClassifierRules
// ---------------------------------------------------------------------------

/// Owned copy of the keyword tables. All keywords are matched as
/// case-insensitive substrings of the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierRules {
    pub tasks: Vec<(TaskType, Vec<String>)>,
    pub priorities: Vec<(Priority, Vec<String>)>,
    pub vision: Vec<String>,
    pub functions: Vec<String>,
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_lowercase()).collect()
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self {
            tasks: TASK_KEYWORDS.iter().map(|(t, w)| (*t, owned(w))).collect(),
            priorities: PRIORITY_KEYWORDS
                .iter()
                .map(|(p, w)| (*p, owned(w)))
                .collect(),
            vision: owned(VISION_KEYWORDS),
            functions: owned(FUNCTION_KEYWORDS),
        }
    }
}

fn count_hits(text: &str, keywords: &[String]) -> usize {
    keywords.iter().filter(|k| text.contains(k.as_str())).count()
}

fn any_hit(text: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| text.contains(k.as_str()))
}

// ---------------------------------------------------------------------------
// TaskClassifier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct TaskClassifier {
    rules: ClassifierRules,
}

impl TaskClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: ClassifierRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ClassifierRules {
        &self.rules
    }

    /// Derive requirements for `prompt`. Never fails.
    pub fn classify(&self, prompt: &str) -> TaskRequirements {
        let lower = prompt.to_lowercase();

        let task_type = self.detect_task_type(&lower);
        let priority = self.detect_priority(&lower);
        let min_context = estimate_context(prompt);
        let require_vision = any_hit(&lower, &self.rules.vision);
        let require_functions = any_hit(&lower, &self.rules.functions);

        debug!(
            task = %task_type,
            %priority,
            min_context,
            require_vision,
            require_functions,
            "Classified prompt"
        );

        TaskRequirements {
            task_type,
            min_context,
            require_vision,
            require_functions,
            priority,
            ..TaskRequirements::new(task_type)
        }
    }

    /// Keyword hit count per task category, in declaration order.
    pub fn task_scores(&self, prompt: &str) -> Vec<(TaskType, usize)> {
        let lower = prompt.to_lowercase();
        self.rules
            .tasks
            .iter()
            .map(|(task, words)| (*task, count_hits(&lower, words)))
            .collect()
    }

    /// Highest hit count wins; ties keep the earlier category; no hits
    /// means [`TaskType::General`].
    fn detect_task_type(&self, lower: &str) -> TaskType {
        let mut detected = TaskType::General;
        let mut best = 0;
        for (task, words) in &self.rules.tasks {
            let hits = count_hits(lower, words);
            if hits > best {
                best = hits;
                detected = *task;
            }
        }
        detected
    }

    /// First category (in precedence order) with any hit wins.
    fn detect_priority(&self, lower: &str) -> Priority {
        self.rules
            .priorities
            .iter()
            .find(|(_, words)| any_hit(lower, words))
            .map(|(p, _)| *p)
            .unwrap_or_default()
    }
}

/// `max(4000, 10 × character count)`, saturating.
pub fn estimate_context(prompt: &str) -> u32 {
    let chars = u32::try_from(prompt.chars().count()).unwrap_or(u32::MAX);
    chars.saturating_mul(CONTEXT_PER_CHAR).max(MIN_CONTEXT_FLOOR)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(prompt: &str) -> TaskRequirements {
        TaskClassifier::new().classify(prompt)
    }

    #[test]
    fn debug_prompt_outscores_codegen() {
        // write + function (2) vs debug + bug (substring of debug) + error (3).
        let classifier = TaskClassifier::new();
        let prompt = "write a function to debug this error";
        let scores = classifier.task_scores(prompt);
        assert_eq!(scores[0], (TaskType::CodeGeneration, 2));
        assert_eq!(scores[1], (TaskType::Debugging, 3));
        assert_eq!(classify(prompt).task_type, TaskType::Debugging);
    }

    #[test]
    fn tie_resolves_to_first_declared() {
        // create + script vs fix + error: 2 vs 2.
        let classifier = TaskClassifier::new();
        let prompt = "create a script to fix the error";
        let scores = classifier.task_scores(prompt);
        assert_eq!(scores[0].1, scores[1].1);
        assert_eq!(classify(prompt).task_type, TaskType::CodeGeneration);
    }

    #[test]
    fn more_debug_keywords_win() {
        let req = classify("Fix this bug: the error is an exception on startup");
        assert_eq!(req.task_type, TaskType::Debugging);
    }

    #[test]
    fn no_keywords_is_general() {
        let req = classify("Bonjour, ça va?");
        assert_eq!(req.task_type, TaskType::General);
        assert_eq!(req.priority, Priority::Balanced);
    }

    #[test]
    fn keywords_match_case_insensitively() {
        assert_eq!(classify("PYTEST MOCK").task_type, TaskType::Testing);
    }

    #[test]
    fn repeated_keyword_counts_once() {
        // "test test test" is one distinct testing keyword; "design system"
        // is two architecture keywords.
        let req = classify("test test test design system");
        assert_eq!(req.task_type, TaskType::ArchitecturalDesign);
    }

    #[test]
    fn architecture_prompt() {
        let req = classify("Propose a design pattern for the plugin structure");
        assert_eq!(req.task_type, TaskType::ArchitecturalDesign);
    }

    #[test]
    fn data_analysis_prompt() {
        let req = classify("Plot a chart of the csv data trend");
        assert_eq!(req.task_type, TaskType::DataAnalysis);
    }

    #[test]
    fn min_context_floor_and_scaling() {
        assert_eq!(classify("hi").min_context, 4000);
        let long = "a".repeat(1000);
        assert_eq!(classify(&long).min_context, 10_000);
        // Counted in characters, not bytes.
        let accented = "é".repeat(500);
        assert_eq!(estimate_context(&accented), 5000);
    }

    #[test]
    fn vision_and_function_flags() {
        let req = classify("Describe this screenshot");
        assert!(req.require_vision);
        assert!(!req.require_functions);

        let req = classify("Call the weather API");
        assert!(req.require_functions);
        assert!(!req.require_vision);
    }

    #[test]
    fn priority_precedence_is_speed_cost_quality() {
        assert_eq!(classify("give me the best and quick answer").priority, Priority::Speed);
        assert_eq!(classify("best cheap option").priority, Priority::Cost);
        assert_eq!(classify("a complex problem").priority, Priority::Quality);
    }

    #[test]
    fn priority_ignores_counts() {
        // Three quality words lose to one speed word.
        let req = classify("best quality complex but fast");
        assert_eq!(req.priority, Priority::Speed);
    }

    #[test]
    fn classifier_never_sets_extra_filters() {
        let req = classify("write the best function quickly");
        assert!(req.max_cost.is_none());
        assert_eq!(req.min_reasoning, 0.0);
        assert_eq!(req.min_coding, 0.0);
    }

    #[test]
    fn custom_rules() {
        let rules = ClassifierRules {
            tasks: vec![
                (TaskType::Documentation, vec!["translate".into()]),
                (TaskType::Testing, vec!["verify".into()]),
            ],
            priorities: vec![(Priority::Cost, vec!["budget".into()])],
            vision: vec!["diagram".into()],
            functions: vec![],
        };
        let req = TaskClassifier::with_rules(rules).classify("Translate this diagram on a budget");
        assert_eq!(req.task_type, TaskType::Documentation);
        assert_eq!(req.priority, Priority::Cost);
        assert!(req.require_vision);
        assert!(!req.require_functions);
    }
}
