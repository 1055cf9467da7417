//! Agent settings.
//!
//! Loaded from `~/.config/deepagent/config.toml` (or an explicit path), then
//! overridden from `DEEPAGENT_*` environment variables, then validated. Every
//! section has defaults, so an empty or missing file is a working setup:
//! Ollama on localhost, ephemeral state backend, in-memory storage.
//!
//! Malformed route tables, unknown backend types and unsupported providers
//! are rejected here with [`AgentError::Configuration`], never at first use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use deepagent_telemetry::LoggingConfig;
use deepagent_types::CollectionId;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

use crate::error::{AgentError, AgentResult};
use crate::vfs::normalize_route_prefix;
use crate::web_tools::ScraperConfig;

/// Prefix of the durable route every composite backend carries.
pub const MEMORIES_PREFIX: &str = "/memories/";

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a research assistant with access to a file system.

## Your Tools:
- ls, read_file, write_file, edit_file: Manage notes and documents
- glob, grep: Search through your files
- web_scraper: Read web pages

## Research Workflow:
1. Break the research question down and write your plan to /plan.md
2. Save your findings to files in the file system
3. Synthesize information into coherent reports

Files under /memories/ are kept across conversations; everything else lasts
for this conversation only.
";

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ollama: OllamaSettings,
    pub model: ModelSettings,
    pub backend: BackendSettings,
    pub storage: StorageSettings,
    pub agent: AgentSettings,
    pub tools: ToolSettings,
    pub logging: LoggingConfig,
}

/// Ollama server and model defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    pub base_url: String,
    pub planning_model: String,
    pub execution_model: String,
    /// Request timeout in seconds.
    pub timeout: u64,
    pub temperature_planning: f32,
    pub temperature_execution: f32,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            planning_model: "ministral-3:latest".to_string(),
            execution_model: "ministral-3:latest".to_string(),
            timeout: 300,
            temperature_planning: 0.0,
            temperature_execution: 0.1,
        }
    }
}

/// Which model the agent runs. Unset fields fall back to `[ollama]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model_name: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Backend variant selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BackendKind {
    /// Everything in the thread's ephemeral state.
    State,
    /// Routed by prefix, defaulting to ephemeral state.
    Composite,
}

/// What a route points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    /// Durable collection shared by all threads.
    Store,
    /// The thread's ephemeral state.
    State,
}

/// One `(prefix, backend-kind)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSettings {
    pub prefix: String,
    pub kind: RouteKind,
    /// Store routes only; defaults to `"filesystem"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl RouteSettings {
    pub fn store(prefix: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            kind: RouteKind::Store,
            collection: Some(collection.into()),
        }
    }

    pub fn state(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            kind: RouteKind::State,
            collection: None,
        }
    }

    /// Collection for a store route.
    pub fn collection_id(&self) -> CollectionId {
        self.collection
            .as_deref()
            .map(CollectionId::new)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// `"state"` or `"composite"`.
    #[serde(rename = "type")]
    pub backend_type: String,
    pub routes: Vec<RouteSettings>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            backend_type: BackendKind::State.to_string(),
            routes: Vec::new(),
        }
    }
}

impl BackendSettings {
    pub fn kind(&self) -> AgentResult<BackendKind> {
        self.backend_type.trim().parse().map_err(|_| {
            AgentError::config(format!(
                "unsupported backend type {:?} (expected \"state\" or \"composite\")",
                self.backend_type
            ))
        })
    }

    /// Routes a composite backend is built with: the configured ones with
    /// normalized prefixes, plus [`MEMORIES_PREFIX`] unless already routed.
    pub fn effective_routes(&self) -> AgentResult<Vec<RouteSettings>> {
        let mut routes = Vec::with_capacity(self.routes.len() + 1);
        for route in &self.routes {
            let prefix = normalize_route_prefix(&route.prefix).map_err(|e| {
                AgentError::config(format!("route prefix {:?}: {}", route.prefix, e))
            })?;
            routes.push(RouteSettings {
                prefix,
                ..route.clone()
            });
        }
        if !routes.iter().any(|r| r.prefix == MEMORIES_PREFIX) {
            routes.push(RouteSettings::store(MEMORIES_PREFIX, CollectionId::DEFAULT));
        }
        Ok(routes)
    }

    fn validate(&self) -> AgentResult<()> {
        let kind = self.kind()?;
        if kind == BackendKind::State && !self.routes.is_empty() {
            return Err(AgentError::config(
                "backend routes require type = \"composite\"",
            ));
        }
        for route in &self.routes {
            if route.kind == RouteKind::State && route.collection.is_some() {
                return Err(AgentError::config(format!(
                    "route {:?}: state routes cannot name a collection",
                    route.prefix
                )));
            }
            if let Some(collection) = &route.collection {
                CollectionId::parse(collection).map_err(|e| {
                    AgentError::config(format!("route {:?}: collection: {}", route.prefix, e))
                })?;
            }
        }
        self.effective_routes().map(|_| ())
    }
}

/// Persistence for thread checkpoints and durable entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Lost when the process exits.
    #[default]
    Memory,
    /// SQLite file at `storage.path`.
    Sqlite,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub kind: StorageKind,
    /// Database file; `~` and `$VARS` are expanded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl StorageSettings {
    /// `path` with `~` and environment variables expanded.
    pub fn resolved_path(&self) -> AgentResult<Option<PathBuf>> {
        self.path
            .as_deref()
            .map(|raw| {
                shellexpand::full(raw)
                    .map(|p| PathBuf::from(p.into_owned()))
                    .map_err(|e| AgentError::config(format!("storage path {:?}: {}", raw, e)))
            })
            .transpose()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub system_prompt: String,
    /// Model turns allowed per invocation.
    pub max_iterations: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_iterations: 25,
        }
    }
}

/// External tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub web_scraper: bool,
    /// Fetch timeout in seconds, for the scraper and the browser.
    pub scraper_timeout: u64,
    pub scraper_max_chars: usize,
    pub browser: bool,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            web_scraper: true,
            scraper_timeout: 30,
            scraper_max_chars: 20_000,
            browser: true,
        }
    }
}

impl ToolSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.scraper_timeout)
    }

    pub fn scraper_config(&self) -> ScraperConfig {
        ScraperConfig {
            timeout: self.timeout(),
            max_chars: self.scraper_max_chars,
        }
    }
}

impl Settings {
    /// Load from the default path, apply environment overrides, validate.
    ///
    /// A missing file means defaults.
    pub fn from_env() -> AgentResult<Self> {
        let mut settings = match Self::config_path() {
            Some(path) if path.exists() => Self::parse_file(&path)?,
            Some(path) => {
                debug!("No config file at {}, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Load and validate a specific file. No environment overrides.
    pub fn load(path: &Path) -> AgentResult<Self> {
        let settings = Self::parse_file(path)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> AgentResult<Self> {
        let settings: Self =
            toml::from_str(text).map_err(|e| AgentError::config(format!("invalid settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// `$XDG_CONFIG_HOME/deepagent/config.toml`.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("deepagent").join("config.toml"))
    }

    fn parse_file(path: &Path) -> AgentResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AgentError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&text)
            .map_err(|e| AgentError::config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Apply `DEEPAGENT_*` overrides from `lookup`.
    ///
    /// Setting `DEEPAGENT_STORAGE_PATH` also selects SQLite storage.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("DEEPAGENT_OLLAMA_BASE_URL") {
            self.ollama.base_url = url;
        }
        if let Some(model) = lookup("DEEPAGENT_MODEL") {
            self.model.model_name = Some(model);
        }
        if let Some(backend) = lookup("DEEPAGENT_BACKEND_TYPE") {
            self.backend.backend_type = backend;
        }
        if let Some(path) = lookup("DEEPAGENT_STORAGE_PATH") {
            self.storage.kind = StorageKind::Sqlite;
            self.storage.path = Some(path);
        }
        if let Some(level) = lookup("DEEPAGENT_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Reject anything that would only fail later.
    pub fn validate(&self) -> AgentResult<()> {
        if self.model.provider != "ollama" {
            return Err(AgentError::config(format!(
                "unsupported model provider {:?} (only \"ollama\" is available)",
                self.model.provider
            )));
        }
        if self.ollama.timeout == 0 {
            return Err(AgentError::config("ollama.timeout must be greater than 0"));
        }
        if self.agent.max_iterations == 0 {
            return Err(AgentError::config("agent.max_iterations must be greater than 0"));
        }
        if self.storage.kind == StorageKind::Sqlite && self.storage.path.is_none() {
            return Err(AgentError::config("storage.kind = \"sqlite\" requires storage.path"));
        }
        self.storage.resolved_path()?;
        self.backend.validate()
    }

    /// Model the agent runs with.
    pub fn model_name(&self) -> &str {
        self.model
            .model_name
            .as_deref()
            .unwrap_or(&self.ollama.execution_model)
    }

    pub fn temperature(&self) -> f32 {
        self.model
            .temperature
            .unwrap_or(self.ollama.temperature_execution)
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.ollama.timeout)
    }
}
