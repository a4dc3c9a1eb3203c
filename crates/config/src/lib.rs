//! Configuration loading, validation, and management for reviewloop.
//!
//! Loads configuration from `~/.reviewloop/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Ceiling used for models missing from `[models]`.
pub const DEFAULT_INPUT_TOKENS_LIMIT: u64 = 100_000;

/// The root configuration structure.
///
/// Maps directly to `~/.reviewloop/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Engine runtime limits
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Tool behaviour
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Global switch for commenter agents
    #[serde(default)]
    pub code_review_agents: ToggleConfig,

    /// Switch for the PR summary agent
    #[serde(default)]
    pub summary_agent: ToggleConfig,

    /// Per-agent model overrides, keyed by agent type or custom agent name
    #[serde(default)]
    pub feature_models: BTreeMap<String, String>,

    /// Per-model limits
    #[serde(default = "default_models")]
    pub models: BTreeMap<String, ModelConfig>,

    /// Agent settings in declaration order
    #[serde(default = "default_agents")]
    pub agents: Vec<AgentSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Tool round-trips allowed per pass
    #[serde(default = "default_max_iterations")]
    pub max_review_tool_iterations: u32,

    /// Worker pool size for concurrent agents
    #[serde(default = "default_max_concurrent_agents")]
    pub max_concurrent_agents: usize,

    /// Run the second (reflection) pass for commenter agents
    #[serde(default = "default_true")]
    pub reflection_enabled: bool,
}

fn default_max_iterations() -> u32 {
    10
}
fn default_max_concurrent_agents() -> usize {
    4
}
fn default_true() -> bool {
    true
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_review_tool_iterations: default_max_iterations(),
            max_concurrent_agents: default_max_concurrent_agents(),
            reflection_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Per-call timeout for repository tools
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,

    /// Cap on matches returned by search tools
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Lines returned per `iterative_file_reader` call
    #[serde(default = "default_read_chunk_lines")]
    pub read_chunk_lines: usize,
}

fn default_tool_timeout() -> u64 {
    30
}
fn default_max_results() -> usize {
    50
}
fn default_read_chunk_lines() -> usize {
    100
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_tool_timeout(),
            max_results: default_max_results(),
            read_chunk_lines: default_read_chunk_lines(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleConfig {
    #[serde(default = "default_true")]
    pub enable: bool,
}

impl Default for ToggleConfig {
    fn default() -> Self {
        Self { enable: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Prompt tokens allowed before a call is refused
    pub input_tokens_limit: u64,
}

fn default_models() -> BTreeMap<String, ModelConfig> {
    [
        ("claude-sonnet-4.5", 200_000),
        ("gpt-4o", 128_000),
        ("gpt-4.1", 128_000),
    ]
    .into_iter()
    .map(|(name, limit)| {
        (
            name.to_string(),
            ModelConfig {
                input_tokens_limit: limit,
            },
        )
    })
    .collect()
}

/// Settings for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Agent type (snake_case) for predefined agents, free name for custom ones
    pub name: String,

    #[serde(default = "default_true")]
    pub enable: bool,

    #[serde(default)]
    pub is_custom_agent: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,

    #[serde(default)]
    pub objective: String,

    #[serde(default)]
    pub custom_prompt: String,

    /// Minimum confidence for a comment to be kept
    #[serde(default = "default_confidence_score")]
    pub confidence_score: f64,
}

fn default_confidence_score() -> f64 {
    0.9
}

impl AgentSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enable: true,
            is_custom_agent: false,
            display_name: None,
            agent_id: None,
            objective: String::new(),
            custom_prompt: String::new(),
            confidence_score: default_confidence_score(),
        }
    }
}

fn default_agents() -> Vec<AgentSettings> {
    [
        ("security", "Identify security vulnerabilities introduced by the change."),
        ("code_maintainability", "Flag code that is hard to read, extend or test."),
        ("code_communication", "Check naming, comments and documentation of the change."),
        ("error", "Find logical errors, unhandled failures and broken edge cases."),
        ("performance_optimization", "Spot avoidable work, allocations and slow paths."),
        ("business_logic_validation", "Verify the change implements the user story."),
    ]
    .into_iter()
    .map(|(name, objective)| AgentSettings {
        objective: objective.to_string(),
        ..AgentSettings::new(name)
    })
    .collect()
}

impl AppConfig {
    /// Load configuration from the default path (~/.reviewloop/config.toml).
    ///
    /// Environment variables override the file:
    /// - `REVIEWLOOP_MAX_ITERATIONS`
    /// - `REVIEWLOOP_MAX_CONCURRENT_AGENTS`
    /// - `REVIEWLOOP_REFLECTION` (`true`/`false`)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// [`AppConfig::load`]).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("REVIEWLOOP_MAX_ITERATIONS") {
            self.runtime.max_review_tool_iterations = parse_env("REVIEWLOOP_MAX_ITERATIONS", &v)?;
        }
        if let Some(v) = lookup("REVIEWLOOP_MAX_CONCURRENT_AGENTS") {
            self.runtime.max_concurrent_agents = parse_env("REVIEWLOOP_MAX_CONCURRENT_AGENTS", &v)?;
        }
        if let Some(v) = lookup("REVIEWLOOP_REFLECTION") {
            self.runtime.reflection_enabled = parse_env("REVIEWLOOP_REFLECTION", &v)?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".reviewloop")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.max_review_tool_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "runtime.max_review_tool_iterations must be at least 1".into(),
            ));
        }

        if self.runtime.max_concurrent_agents == 0 {
            return Err(ConfigError::ValidationError(
                "runtime.max_concurrent_agents must be at least 1".into(),
            ));
        }

        if let Some((name, _)) = self.models.iter().find(|(_, m)| m.input_tokens_limit == 0) {
            return Err(ConfigError::ValidationError(format!(
                "models.{name}.input_tokens_limit must be > 0"
            )));
        }

        let mut seen = std::collections::BTreeSet::new();
        for agent in &self.agents {
            if agent.name.trim().is_empty() {
                return Err(ConfigError::ValidationError("agent name must not be empty".into()));
            }
            if !seen.insert(agent.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "agent '{}' is declared more than once",
                    agent.name
                )));
            }
            if !(0.0..=1.0).contains(&agent.confidence_score) {
                return Err(ConfigError::ValidationError(format!(
                    "agent '{}': confidence_score must be between 0.0 and 1.0",
                    agent.name
                )));
            }
        }

        Ok(())
    }

    /// Input-token ceilings keyed by model name.
    pub fn model_ceilings(&self) -> BTreeMap<String, u64> {
        self.models
            .iter()
            .map(|(name, m)| (name.clone(), m.input_tokens_limit))
            .collect()
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            runtime: RuntimeConfig::default(),
            tools: ToolsConfig::default(),
            code_review_agents: ToggleConfig::default(),
            summary_agent: ToggleConfig::default(),
            feature_models: BTreeMap::new(),
            models: default_models(),
            agents: default_agents(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::EnvError {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid value {value:?} for environment variable {key}")]
    EnvError { key: String, value: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
