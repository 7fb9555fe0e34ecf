//! Caller-facing routing errors.

use serde::Serialize;

use crate::providers::ProviderError;
use crate::types::TaskType;

/// One failed dispatch attempt, kept for reporting after exhaustion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedAttempt {
    pub model_id: String,
    #[serde(serialize_with = "serialize_display")]
    pub error: ProviderError,
}

fn serialize_display<S: serde::Serializer>(err: &ProviderError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(err)
}

/// Errors that cross the orchestrator boundary. Per-attempt dispatch
/// failures are absorbed and only surface inside [`RouteError::ExhaustedFallback`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RouteError {
    /// No endpoint passes the hard filters or guidance for the task.
    #[error("No suitable model found for task {task}")]
    NoSuitableModel { task: TaskType },

    /// The explicit override names an id the catalog does not know.
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// Primary dispatch and every fallback candidate failed.
    #[error("All {} attempts failed for task {task}", attempts.len())]
    ExhaustedFallback {
        task: TaskType,
        attempts: Vec<FailedAttempt>,
    },
}

impl RouteError {
    /// Attempts made before giving up; empty for selection errors.
    pub fn attempts(&self) -> &[FailedAttempt] {
        match self {
            Self::ExhaustedFallback { attempts, .. } => attempts,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = RouteError::NoSuitableModel {
            task: TaskType::CodeGeneration,
        };
        assert_eq!(err.to_string(), "No suitable model found for task code_generation");

        let err = RouteError::ExhaustedFallback {
            task: TaskType::Debugging,
            attempts: vec![
                FailedAttempt {
                    model_id: "gpt-4o".into(),
                    error: ProviderError::RateLimit,
                },
                FailedAttempt {
                    model_id: "grok-3".into(),
                    error: ProviderError::Timeout,
                },
            ],
        };
        assert_eq!(err.to_string(), "All 2 attempts failed for task debugging");
        assert_eq!(err.attempts().len(), 2);
        assert!(RouteError::UnknownModel("x".into()).attempts().is_empty());
    }

    #[test]
    fn failed_attempt_serializes_error_text() {
        let attempt = FailedAttempt {
            model_id: "gpt-4o".into(),
            error: ProviderError::InvalidKey,
        };
        let json = serde_json::to_value(&attempt).unwrap();
        assert_eq!(json["model_id"], "gpt-4o");
        assert_eq!(json["error"], "Invalid API key");
    }
}
