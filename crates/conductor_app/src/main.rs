//! `conductor` - route prompts to the best-fit model from the command line.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use conductor_ai::{
    Disqualification, GuidanceRules, HttpClientFactory, ModelCatalog, ModelOrchestrator,
    ProviderSettings, ProviderType, RouteError, RouteOptions, TaskRequirements, TaskType,
    load_guide,
};
use conductor_core::{ConductorConfig, logging};

#[derive(Parser)]
#[command(name = "conductor")]
#[command(about = "Route prompts to the best-fit LLM endpoint")]
#[command(version)]
struct Cli {
    /// Configuration file path (default: ~/.conductor/config.json)
    #[arg(short, long, global = true, value_name = "FILE", env = "CONDUCTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Routing guide markdown file
    #[arg(short, long, global = true, value_name = "FILE")]
    guide: Option<PathBuf>,

    /// Extra catalog entries (JSON array) merged over the built-in catalog
    #[arg(long, global = true, value_name = "FILE")]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select a model for the prompt and send it
    Route {
        prompt: String,

        /// Catalog id (or provider-facing name) to use instead of automatic selection
        #[arg(short, long)]
        model: Option<String>,

        /// Task type to use instead of the classified one
        #[arg(short, long)]
        task: Option<TaskType>,

        #[arg(long)]
        temperature: Option<f32>,

        #[arg(long)]
        max_tokens: Option<u32>,

        /// System prompt sent ahead of the user prompt
        #[arg(long)]
        system: Option<String>,

        /// Print the routing decision without calling the provider
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the requirements derived from a prompt
    Classify { prompt: String },
    /// List catalog endpoints, scored against a prompt or task when given
    Models {
        #[arg(long)]
        prompt: Option<String>,

        /// Task type; on its own, scores against default requirements for it
        #[arg(short, long)]
        task: Option<TaskType>,
    },
    /// Print the parsed guidance rules
    Guide,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(guide) = cli.guide {
        config.guide_path = Some(guide);
    }
    if let Some(catalog) = cli.catalog {
        config.catalog_path = Some(catalog);
    }

    let _guard = match logging::init_logging(&config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Logging disabled: {e:#}");
            None
        }
    };

    match cli.command {
        Commands::Route {
            prompt,
            model,
            task,
            temperature,
            max_tokens,
            system,
            dry_run,
        } => {
            let orchestrator = build_orchestrator(&config)?;
            if dry_run {
                let decision = orchestrator.plan(&prompt, model.as_deref(), task)?;
                return print_json(&decision);
            }

            let mut options = RouteOptions::default();
            options.completion.temperature = temperature;
            options.completion.max_tokens = max_tokens;
            options.completion.system_prompt = system;

            match orchestrator
                .route(&prompt, model.as_deref(), task, options)
                .await
            {
                Ok(response) => print_json(&response),
                Err(e) => {
                    report_attempts(&e);
                    Err(e.into())
                }
            }
        }
        Commands::Classify { prompt } => {
            let orchestrator = build_orchestrator(&config)?;
            let requirements = orchestrator.classifier().classify(&prompt);
            let scores: serde_json::Map<String, serde_json::Value> = orchestrator
                .classifier()
                .task_scores(&prompt)
                .into_iter()
                .map(|(task, hits)| (task.key().to_string(), hits.into()))
                .collect();
            print_json(&serde_json::json!({
                "requirements": requirements,
                "keyword_hits": scores,
            }))
        }
        Commands::Models { prompt, task } => {
            let orchestrator = build_orchestrator(&config)?;
            print_json(&model_rows(&orchestrator, prompt.as_deref(), task))
        }
        Commands::Guide => print_json(&load_guidance(&config)),
    }
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

fn load_config(path: Option<&Path>) -> Result<ConductorConfig> {
    match path {
        Some(path) => {
            let mut config = ConductorConfig::load_from(path)?;
            config.apply_env(|name| std::env::var(name).ok());
            Ok(config)
        }
        None => ConductorConfig::load(),
    }
}

fn load_catalog(config: &ConductorConfig) -> Result<ModelCatalog> {
    let catalog = ModelCatalog::builtin();
    match &config.catalog_path {
        Some(path) => catalog
            .with_json_file(path)
            .context("Failed to load extra catalog entries"),
        None => Ok(catalog),
    }
}

fn load_guidance(config: &ConductorConfig) -> GuidanceRules {
    load_guide(config.guide_path.as_deref())
}

fn build_orchestrator(config: &ConductorConfig) -> Result<ModelOrchestrator> {
    let catalog = load_catalog(config)?;
    let guidance = load_guidance(config);
    if config.configured_key_count() == 0 {
        warn!("No provider API keys configured; only local endpoints can be reached");
    }
    info!(models = catalog.len(), "Orchestrator ready");

    let factory = HttpClientFactory::new(ProviderSettings::from(config));
    Ok(ModelOrchestrator::new(catalog, guidance, Arc::new(factory)))
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report_attempts(err: &RouteError) {
    for attempt in err.attempts() {
        eprintln!("  {} failed: {}", attempt.model_id, attempt.error);
    }
}

#[derive(Debug, Serialize)]
struct ModelRow {
    id: String,
    api_name: String,
    provider: ProviderType,
    context_window: u32,
    blended_cost: f64,
    blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disqualified: Option<Disqualification>,
}

fn model_rows(
    orchestrator: &ModelOrchestrator,
    prompt: Option<&str>,
    task: Option<TaskType>,
) -> Vec<ModelRow> {
    let requirements = match (prompt, task) {
        (Some(p), task) => Some(orchestrator.analyze(p, task)),
        (None, Some(task)) => Some(TaskRequirements::new(task)),
        (None, None) => None,
    };
    let guidance = orchestrator.guidance();
    let scorer = orchestrator.scorer();

    let mut rows: Vec<ModelRow> = orchestrator
        .catalog()
        .iter()
        .map(|m| ModelRow {
            id: m.id.clone(),
            api_name: m.api_name.clone(),
            provider: m.provider,
            context_window: m.context_window,
            blended_cost: m.blended_cost(),
            blocked: guidance.is_blocked(&m.id) || guidance.is_blocked(&m.api_name),
            score: requirements.as_ref().map(|r| scorer.score(m, r)),
            disqualified: requirements
                .as_ref()
                .and_then(|r| scorer.disqualification(m, r)),
        })
        .collect();

    if requirements.is_some() {
        rows.sort_by(|a, b| {
            b.score
                .unwrap_or(0.0)
                .total_cmp(&a.score.unwrap_or(0.0))
        });
    }
    rows
}
