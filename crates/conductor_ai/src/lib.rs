pub mod catalog;
pub mod error;
pub mod guidance;
pub mod providers;
pub mod routing;
pub mod types;

// Re-export core types at crate root for convenience.
pub use catalog::{BUILTIN_MODELS, ModelCatalog};
pub use error::{FailedAttempt, RouteError};
pub use guidance::{GuidanceRules, load_guide, normalize_task_key, parse_guide};
pub use providers::{
    ClientFactory, ClientRegistry, CompletionClient, HttpClientFactory, ProviderError,
    ProviderSettings,
};
pub use routing::{
    Disqualification, FitnessScorer, ModelOrchestrator, RoutingDecision, ScoredModel,
    SelectionSource, TaskClassifier,
};
pub use types::*;
