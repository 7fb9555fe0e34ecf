//! Conductor Routing System
//!
//! Prompt classification, capability scoring, and the orchestrator that
//! combines them with guidance rules and provider fallback.

mod fitness_scorer;
mod orchestrator;
pub mod task_classifier;

pub use fitness_scorer::*;
pub use orchestrator::*;
pub use task_classifier::*;
