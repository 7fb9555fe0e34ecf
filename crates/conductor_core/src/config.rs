use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

// ---------------------------------------------------------------------------
// Environment variable names
// ---------------------------------------------------------------------------

const ENV_OPENAI_KEY: &str = "OPENAI_API_KEY";
const ENV_ANTHROPIC_KEY: &str = "ANTHROPIC_API_KEY";
const ENV_GOOGLE_KEY: &str = "GOOGLE_API_KEY";
const ENV_GEMINI_KEY: &str = "GEMINI_API_KEY";
const ENV_XAI_KEY: &str = "XAI_API_KEY";
const ENV_AZURE_KEY: &str = "AZURE_OPENAI_API_KEY";
const ENV_OLLAMA_HOST: &str = "OLLAMA_HOST";
const ENV_GUIDE_PATH: &str = "CONDUCTOR_GUIDE_PATH";
const ENV_CATALOG_PATH: &str = "CONDUCTOR_CATALOG_PATH";
const ENV_LOG: &str = "CONDUCTOR_LOG";

// ---------------------------------------------------------------------------
// ConductorConfig
// ---------------------------------------------------------------------------

/// Router configuration stored at `~/.conductor/config.json`.
///
/// API keys are **never** written to the JSON file. They are read from the
/// environment by [`ConductorConfig::apply_env`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConductorConfig {
    #[serde(skip)]
    pub openai_api_key: Option<String>,
    #[serde(skip)]
    pub anthropic_api_key: Option<String>,
    #[serde(skip)]
    pub google_api_key: Option<String>,
    #[serde(skip)]
    pub xai_api_key: Option<String>,
    #[serde(skip)]
    pub azure_api_key: Option<String>,

    // Endpoints
    pub ollama_url: String,
    pub azure_endpoint: Option<String>,

    // Routing data sources
    pub guide_path: Option<PathBuf>,
    pub catalog_path: Option<PathBuf>,

    // Provider calls
    pub request_timeout_secs: u64,
    pub default_max_tokens: u32,

    // General
    pub log_level: String,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            anthropic_api_key: None,
            google_api_key: None,
            xai_api_key: None,
            azure_api_key: None,
            ollama_url: "http://localhost:11434".into(),
            azure_endpoint: None,
            guide_path: None,
            catalog_path: None,
            request_timeout_secs: 60,
            default_max_tokens: 4096,
            log_level: "info".into(),
        }
    }
}

impl ConductorConfig {
    /// Returns the base config directory: `~/.conductor/`
    pub fn base_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".conductor"))
    }

    /// Returns the config file path: `~/.conductor/config.json`
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("config.json"))
    }

    /// Returns the logs directory: `~/.conductor/logs/`
    pub fn logs_dir() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("logs"))
    }

    /// Loads `~/.conductor/config.json` (defaults when absent) and then
    /// overlays the process environment.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load config from a specific file path. A missing file yields the
    /// defaults; nothing is written back.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save config to a specific file path (API keys are excluded via
    /// `#[serde(skip)]`).
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Overlay values from an environment lookup. Empty values are ignored.
    ///
    /// Takes the lookup as a closure so tests never touch the real process
    /// environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_OPENAI_KEY) {
            self.openai_api_key = Some(key);
        }
        if let Some(key) = get(ENV_ANTHROPIC_KEY) {
            self.anthropic_api_key = Some(key);
        }
        if let Some(key) = get(ENV_GOOGLE_KEY).or_else(|| get(ENV_GEMINI_KEY)) {
            self.google_api_key = Some(key);
        }
        if let Some(key) = get(ENV_XAI_KEY) {
            self.xai_api_key = Some(key);
        }
        if let Some(key) = get(ENV_AZURE_KEY) {
            self.azure_api_key = Some(key);
        }
        if let Some(host) = get(ENV_OLLAMA_HOST) {
            self.ollama_url = normalize_ollama_host(&host);
        }
        if let Some(path) = get(ENV_GUIDE_PATH) {
            self.guide_path = Some(PathBuf::from(path));
        }
        if let Some(path) = get(ENV_CATALOG_PATH) {
            self.catalog_path = Some(PathBuf::from(path));
        }
        if let Some(level) = get(ENV_LOG) {
            self.log_level = level;
        }
    }

    /// Number of cloud providers with a non-empty API key.
    pub fn configured_key_count(&self) -> usize {
        [
            &self.openai_api_key,
            &self.anthropic_api_key,
            &self.google_api_key,
            &self.xai_api_key,
            &self.azure_api_key,
        ]
        .iter()
        .filter(|k| k.as_ref().is_some_and(|v| !v.is_empty()))
        .count()
    }
}

/// `OLLAMA_HOST` is commonly set without a scheme (`127.0.0.1:11434`).
fn normalize_ollama_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}
