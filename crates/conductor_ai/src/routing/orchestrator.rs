//! Model Orchestrator
//!
//! Composes classification, guidance, scoring and dispatch:
//!
//! 1. classify the prompt (or take the caller's task override);
//! 2. pick an endpoint: explicit override, else the first valid guidance
//!    preference, else the top-ranked unblocked endpoint;
//! 3. dispatch through the provider client;
//! 4. on failure walk the fallback chain until one attempt succeeds.
//!
//! Catalog and guidance are plain values owned by the orchestrator. The
//! only shared mutable state is the provider client cache.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::catalog::ModelCatalog;
use crate::error::{FailedAttempt, RouteError};
use crate::guidance::GuidanceRules;
use crate::providers::{ClientFactory, ClientRegistry, ProviderError};
use crate::types::{
    ApiResponse, ChatMessage, CompletionOptions, ModelCapabilities, Priority, ProviderType,
    RouteOptions, TaskRequirements, TaskType,
};

use super::fitness_scorer::{FitnessScorer, ScoredModel};
use super::task_classifier::TaskClassifier;

/// Number of endpoints in a synthesized fallback chain.
pub const SYNTHESIZED_CHAIN_LEN: usize = 3;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which selection path produced the primary endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionSource {
    Explicit,
    Guidance,
    Ranked,
}

impl std::fmt::Display for SelectionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Explicit => "explicit",
            Self::Guidance => "guidance",
            Self::Ranked => "ranked",
        };
        f.write_str(s)
    }
}

/// The result of a routing decision, without dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDecision {
    /// Catalog id of the selected endpoint.
    pub model_id: String,
    /// Name sent to the provider.
    pub api_name: String,
    pub provider: ProviderType,
    pub task_type: TaskType,
    pub priority: Priority,
    pub source: SelectionSource,
    /// Fitness against the analyzed requirements.
    pub score: f64,
    /// Human-readable explanation of why this route was chosen.
    pub reasoning: String,
}

struct Selection<'a> {
    model: &'a ModelCapabilities,
    source: SelectionSource,
    score: f64,
    reasoning: String,
}

// ---------------------------------------------------------------------------
// ModelOrchestrator
// ---------------------------------------------------------------------------

pub struct ModelOrchestrator {
    catalog: ModelCatalog,
    guidance: GuidanceRules,
    classifier: TaskClassifier,
    scorer: FitnessScorer,
    clients: ClientRegistry,
}

impl ModelOrchestrator {
    pub fn new(
        catalog: ModelCatalog,
        guidance: GuidanceRules,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        Self {
            catalog,
            guidance,
            classifier: TaskClassifier::new(),
            scorer: FitnessScorer::new(),
            clients: ClientRegistry::new(factory),
        }
    }

    pub fn with_classifier(mut self, classifier: TaskClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_scorer(mut self, scorer: FitnessScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn guidance(&self) -> &GuidanceRules {
        &self.guidance
    }

    pub fn classifier(&self) -> &TaskClassifier {
        &self.classifier
    }

    pub fn scorer(&self) -> &FitnessScorer {
        &self.scorer
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Classify `prompt`, replacing the detected task with `task_override`
    /// when given.
    pub fn analyze(&self, prompt: &str, task_override: Option<TaskType>) -> TaskRequirements {
        let mut req = self.classifier.classify(prompt);
        if let Some(task) = task_override {
            req.task_type = task;
        }
        info!(
            task = %req.task_type,
            priority = %req.priority,
            min_context = req.min_context,
            vision = req.require_vision,
            functions = req.require_functions,
            "Analyzed prompt"
        );
        req
    }

    /// Blocked by catalog id or by provider-facing name.
    fn is_blocked(&self, model: &ModelCapabilities) -> bool {
        self.guidance.is_blocked(&model.id) || self.guidance.is_blocked(&model.api_name)
    }

    /// Scored, block-filtered candidates in descending score order.
    pub fn rank_candidates(&self, req: &TaskRequirements) -> Vec<ScoredModel<'_>> {
        self.scorer.rank(
            self.catalog.iter().filter(|m| !self.is_blocked(m)),
            req,
        )
    }

    /// Automatic selection: guidance preference first, then ranking.
    pub fn select_model(&self, req: &TaskRequirements) -> Option<&ModelCapabilities> {
        self.select_auto(req).map(|s| s.model)
    }

    fn select_auto(&self, req: &TaskRequirements) -> Option<Selection<'_>> {
        let preferred = self.guidance.preferred_for(req.task_type.key());
        let valid = preferred.iter().find_map(|id| {
            let model = self.catalog.get(id)?;
            let score = self.scorer.score(model, req);
            (score > 0.0).then_some((model, score))
        });

        if let Some((model, score)) = valid {
            return Some(Selection {
                model,
                source: SelectionSource::Guidance,
                score,
                reasoning: format!(
                    "First valid guidance preference for {}: {} (score {score:.2})",
                    req.task_type, model.id
                ),
            });
        }
        if !preferred.is_empty() {
            debug!(task = %req.task_type, "No guidance preference is usable, ranking catalog");
        }

        let ranked = self.rank_candidates(req);
        let top = ranked.first()?;
        Some(Selection {
            model: top.model,
            source: SelectionSource::Ranked,
            score: top.score,
            reasoning: format!(
                "Top-ranked of {} candidates for {} ({} priority, score {:.2})",
                ranked.len(),
                req.task_type,
                req.priority,
                top.score
            ),
        })
    }

    /// Look up an explicit override by catalog id, then by provider-facing
    /// name.
    fn resolve_explicit(&self, id: &str) -> Option<&ModelCapabilities> {
        self.catalog
            .get(id)
            .or_else(|| self.catalog.iter().find(|m| m.api_name == id))
    }

    fn select(
        &self,
        req: &TaskRequirements,
        explicit: Option<&str>,
    ) -> Result<Selection<'_>, RouteError> {
        let selection = match explicit {
            Some(id) => {
                let model = self
                    .resolve_explicit(id)
                    .ok_or_else(|| RouteError::UnknownModel(id.to_string()))?;
                Selection {
                    model,
                    source: SelectionSource::Explicit,
                    score: self.scorer.score(model, req),
                    reasoning: format!(
                        "Explicit model selection: {} via {}",
                        model.id, model.provider
                    ),
                }
            }
            None => self.select_auto(req).ok_or(RouteError::NoSuitableModel {
                task: req.task_type,
            })?,
        };

        info!(
            model = %selection.model.id,
            provider = %selection.model.provider,
            source = %selection.source,
            score = selection.score,
            "Selected model"
        );
        Ok(selection)
    }

    /// Decide where `prompt` would go without dispatching.
    pub fn plan(
        &self,
        prompt: &str,
        explicit_model: Option<&str>,
        task_type: Option<TaskType>,
    ) -> Result<RoutingDecision, RouteError> {
        let req = self.analyze(prompt, task_type);
        let selection = self.select(&req, explicit_model)?;
        Ok(RoutingDecision {
            model_id: selection.model.id.clone(),
            api_name: selection.model.api_name.clone(),
            provider: selection.model.provider,
            task_type: req.task_type,
            priority: req.priority,
            source: selection.source,
            score: selection.score,
            reasoning: selection.reasoning,
        })
    }

    // ------------------------------------------------------------------
    // Fallback
    // ------------------------------------------------------------------

    /// Candidate ids to try after `failed_id` failed: the guidance chain for
    /// the task, or else the top re-scored endpoints other than `failed_id`.
    ///
    /// A guidance chain is returned as authored; the walk skips ids that
    /// were already tried or are missing from the catalog.
    pub fn fallback_chain(&self, req: &TaskRequirements, failed_id: &str) -> Vec<String> {
        let chain = self.guidance.fallback_for(req.task_type.key());
        if !chain.is_empty() {
            return chain.to_vec();
        }

        self.scorer
            .rank(self.catalog.iter().filter(|m| m.id != failed_id), req)
            .into_iter()
            .take(SYNTHESIZED_CHAIN_LEN)
            .map(|s| s.model.id.clone())
            .collect()
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    async fn dispatch(
        &self,
        model: &ModelCapabilities,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<ApiResponse, ProviderError> {
        // The registry lock is released before the await below.
        let client = self.clients.get_or_create(model.provider)?;
        client.complete(&model.api_name, messages, options).await
    }

    /// Route `prompt` to a model and return the first successful response.
    ///
    /// Fails without dispatching when selection fails or the explicit id is
    /// unknown; fails with [`RouteError::ExhaustedFallback`] when the primary
    /// attempt and every fallback candidate fail.
    pub async fn route(
        &self,
        prompt: &str,
        explicit_model: Option<&str>,
        task_type: Option<TaskType>,
        options: RouteOptions,
    ) -> Result<ApiResponse, RouteError> {
        let req = self.analyze(prompt, task_type);
        let primary = self.select(&req, explicit_model)?.model;

        let RouteOptions {
            messages,
            completion,
        } = options;
        let messages = messages.unwrap_or_else(|| vec![ChatMessage::user(prompt)]);

        let mut attempts: Vec<FailedAttempt> = Vec::new();

        match self.dispatch(primary, &messages, &completion).await {
            Ok(response) => return Ok(response),
            Err(e) => {
                warn!(
                    model = %primary.id,
                    provider = %primary.provider,
                    error = %e,
                    "Primary dispatch failed"
                );
                attempts.push(FailedAttempt {
                    model_id: primary.id.clone(),
                    error: e,
                });
            }
        }

        let chain = self.fallback_chain(&req, &primary.id);
        info!(
            task = %req.task_type,
            failed = %primary.id,
            chain = ?chain,
            "Starting fallback"
        );

        for id in &chain {
            if attempts.iter().any(|a| &a.model_id == id) {
                continue;
            }
            let Some(model) = self.catalog.get(id) else {
                debug!(model = %id, "Skipping fallback id missing from catalog");
                continue;
            };

            info!(model = %model.id, provider = %model.provider, "Trying fallback");
            match self.dispatch(model, &messages, &completion).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!(
                        model = %model.id,
                        provider = %model.provider,
                        error = %e,
                        "Fallback dispatch failed"
                    );
                    attempts.push(FailedAttempt {
                        model_id: model.id.clone(),
                        error: e,
                    });
                }
            }
        }

        error!(
            task = %req.task_type,
            attempts = attempts.len(),
            "All routing attempts failed"
        );
        Err(RouteError::ExhaustedFallback {
            task: req.task_type,
            attempts,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
