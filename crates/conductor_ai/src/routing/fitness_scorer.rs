//! Fitness Scorer
//!
//! Scores one endpoint against one request's requirements. Hard filters
//! (context window, vision, function calling, plus the optional cost and
//! quality floors) disqualify with a score of exactly `0.0`; otherwise the
//! score is `0.5` plus a priority bonus plus a task bonus, clamped to `1.0`.

use serde::{Deserialize, Serialize};

use crate::types::{ModelCapabilities, Priority, TaskRequirements, TaskType};

/// Blended cost (USD / 1M tokens) treated as "as expensive as it gets" by the
/// cost priority. Matches the costliest built-in entry's input price.
pub const COST_CEILING: f64 = 60.0;

const BASE_SCORE: f64 = 0.5;

/// Why an endpoint was excluded before scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum Disqualification {
    ContextTooSmall { required: u32, available: u32 },
    VisionUnsupported,
    FunctionsUnsupported,
    TooExpensive { limit: f64, blended_cost: f64 },
    ReasoningTooLow { minimum: f64, actual: f64 },
    CodingTooLow { minimum: f64, actual: f64 },
}

impl std::fmt::Display for Disqualification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContextTooSmall {
                required,
                available,
            } => write!(f, "needs {required} tokens of context, has {available}"),
            Self::VisionUnsupported => f.write_str("no vision support"),
            Self::FunctionsUnsupported => f.write_str("no function calling"),
            Self::TooExpensive {
                limit,
                blended_cost,
            } => write!(f, "blended cost {blended_cost:.2} above {limit:.2}"),
            Self::ReasoningTooLow { minimum, actual } => {
                write!(f, "reasoning {actual} below {minimum}")
            }
            Self::CodingTooLow { minimum, actual } => write!(f, "coding {actual} below {minimum}"),
        }
    }
}

/// A scored endpoint; produced by [`FitnessScorer::rank`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredModel<'a> {
    pub model: &'a ModelCapabilities,
    pub score: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct FitnessScorer {
    cost_ceiling: f64,
}

impl Default for FitnessScorer {
    fn default() -> Self {
        Self {
            cost_ceiling: COST_CEILING,
        }
    }
}

impl FitnessScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different reference price for the cost priority.
    pub fn with_cost_ceiling(mut self, ceiling: f64) -> Self {
        self.cost_ceiling = ceiling;
        self
    }

    /// First hard filter `model` fails, if any.
    pub fn disqualification(
        &self,
        model: &ModelCapabilities,
        req: &TaskRequirements,
    ) -> Option<Disqualification> {
        if req.min_context > model.context_window {
            return Some(Disqualification::ContextTooSmall {
                required: req.min_context,
                available: model.context_window,
            });
        }
        if req.require_vision && !model.supports_vision {
            return Some(Disqualification::VisionUnsupported);
        }
        if req.require_functions && !model.supports_function_calling {
            return Some(Disqualification::FunctionsUnsupported);
        }
        if let Some(limit) = req.max_cost
            && model.blended_cost() > limit
        {
            return Some(Disqualification::TooExpensive {
                limit,
                blended_cost: model.blended_cost(),
            });
        }
        if model.reasoning_score < req.min_reasoning {
            return Some(Disqualification::ReasoningTooLow {
                minimum: req.min_reasoning,
                actual: model.reasoning_score,
            });
        }
        if model.coding_score < req.min_coding {
            return Some(Disqualification::CodingTooLow {
                minimum: req.min_coding,
                actual: model.coding_score,
            });
        }
        None
    }

    /// Fitness in `[0.0, 1.0]`; `0.0` means disqualified.
    pub fn score(&self, model: &ModelCapabilities, req: &TaskRequirements) -> f64 {
        if self.disqualification(model, req).is_some() {
            return 0.0;
        }

        let reasoning = model.reasoning_score / 100.0;
        let coding = model.coding_score / 100.0;
        let speed = model.speed_rating / 10.0;

        let priority_bonus = match req.priority {
            Priority::Quality => reasoning * 0.3 + coding * 0.2,
            Priority::Speed => speed * 0.5,
            Priority::Cost => (1.0 - model.blended_cost() / self.cost_ceiling).max(0.0) * 0.5,
            Priority::Balanced => reasoning * 0.2 + coding * 0.2 + speed * 0.1,
        };

        let task_bonus = match req.task_type {
            TaskType::CodeGeneration | TaskType::Debugging => coding * 0.2,
            TaskType::Reasoning | TaskType::ArchitecturalDesign => reasoning * 0.2,
            _ => 0.0,
        };

        (BASE_SCORE + priority_bonus + task_bonus).min(1.0)
    }

    /// Score `models`, drop zero scores, and sort descending. The sort is
    /// stable, so input order breaks ties.
    pub fn rank<'a>(
        &self,
        models: impl IntoIterator<Item = &'a ModelCapabilities>,
        req: &TaskRequirements,
    ) -> Vec<ScoredModel<'a>> {
        let mut scored: Vec<ScoredModel<'a>> = models
            .into_iter()
            .map(|model| ScoredModel {
                model,
                score: self.score(model, req),
            })
            .filter(|s| s.score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
