//! Configuration loading, validation, and management for WellCoach.
//!
//! Loads configuration from `~/.wellcoach/config.toml` (or the path in
//! `WELLCOACH_CONFIG`). Provider API keys are either literals or `env:VARNAME`
//! references resolved against the process environment when the model
//! gateway starts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use wellcoach_core::AgentRole;

/// Prefix marking an API key as an environment variable reference.
pub const ENV_KEY_PREFIX: &str = "env:";

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "WELLCOACH_CONFIG";

/// The root configuration structure.
///
/// Maps directly to `~/.wellcoach/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Providers and the agent → model mapping
    #[serde(default)]
    pub models: ModelConfig,

    /// Pipeline driver settings
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Declarative model configuration consumed by the model gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider name → credentials and endpoint
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,

    /// Logical agent name → provider/model/temperature
    #[serde(default, alias = "agentModelMapping")]
    pub agent_model_mapping: BTreeMap<String, AgentModelConfig>,
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Literal key or `env:VARNAME`
    #[serde(default, alias = "apiKey", skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, alias = "apiUrl", skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl ProviderConfig {
    /// A provider whose key comes from the given environment variable.
    pub fn from_env(var: &str) -> Self {
        Self {
            api_key: Some(format!("{ENV_KEY_PREFIX}{var}")),
            api_url: None,
        }
    }

    /// How the API key is expressed, if at all.
    pub fn key_ref(&self) -> Option<KeyRef<'_>> {
        self.api_key.as_deref().map(KeyRef::parse)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentModelConfig {
    pub provider: String,

    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, alias = "maxTokens", skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl AgentModelConfig {
    pub fn new(provider: impl Into<String>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            temperature,
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound on a single agent step; unset waits indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_timeout_secs: Option<u64>,
}

impl PipelineConfig {
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_secs.map(Duration::from_secs)
    }
}

/// How an API key is written in the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRef<'a> {
    Literal(&'a str),
    Env(&'a str),
}

impl<'a> KeyRef<'a> {
    pub fn parse(raw: &'a str) -> Self {
        match raw.strip_prefix(ENV_KEY_PREFIX) {
            Some(var) => KeyRef::Env(var.trim()),
            None => KeyRef::Literal(raw),
        }
    }
}

/// A provider entry with its key resolved.
#[derive(Clone, PartialEq)]
pub struct ResolvedProvider {
    pub name: String,
    /// Empty when no usable key was found.
    pub api_key: String,
    pub api_url: Option<String>,
}

impl ResolvedProvider {
    pub fn has_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl std::fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("name", &self.name)
            .field("api_key", &if self.has_key() { "[REDACTED]" } else { "" })
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // env references are not secrets, literal keys are
        let key = match self.key_ref() {
            Some(KeyRef::Env(var)) => format!("{ENV_KEY_PREFIX}{var}"),
            Some(KeyRef::Literal(_)) => "[REDACTED]".to_string(),
            None => "None".to_string(),
        };
        f.debug_struct("ProviderConfig")
            .field("api_key", &key)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl ModelConfig {
    /// The hardcoded configuration used when the live one yields no clients.
    pub fn fallback() -> Self {
        let mut providers = BTreeMap::new();
        providers.insert("openai".to_string(), ProviderConfig::from_env("OPENAI_API_KEY"));
        providers.insert(
            "anthropic".to_string(),
            ProviderConfig::from_env("ANTHROPIC_API_KEY"),
        );

        let mut agent_model_mapping = BTreeMap::new();
        agent_model_mapping.insert(
            AgentRole::Lead.config_key().to_string(),
            AgentModelConfig::new("openai", "gpt-4o-mini", 0.3),
        );
        agent_model_mapping.insert(
            AgentRole::Nutrition.config_key().to_string(),
            AgentModelConfig::new("anthropic", "claude-3-5-sonnet-latest", 0.5),
        );

        Self {
            providers,
            agent_model_mapping,
        }
    }

    /// Logical agent names, sorted.
    pub fn agent_names(&self) -> Vec<String> {
        self.agent_model_mapping.keys().cloned().collect()
    }

    /// Resolve every provider key, looking `env:` references up with `lookup`.
    ///
    /// Unset or empty variables resolve to an empty key and log a warning.
    pub fn resolve_providers(
        &self,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> BTreeMap<String, ResolvedProvider> {
        self.providers
            .iter()
            .map(|(name, provider)| {
                let api_key = match provider.key_ref() {
                    Some(KeyRef::Literal(key)) => key.to_string(),
                    Some(KeyRef::Env(var)) => match lookup(var).filter(|v| !v.trim().is_empty()) {
                        Some(value) => value,
                        None => {
                            tracing::warn!(provider = %name, var, "API key environment variable is not set");
                            String::new()
                        }
                    },
                    None => {
                        tracing::warn!(provider = %name, "Provider has no api_key configured");
                        String::new()
                    }
                };
                let resolved = ResolvedProvider {
                    name: name.clone(),
                    api_key,
                    api_url: provider.api_url.clone(),
                };
                (name.clone(), resolved)
            })
            .collect()
    }

    /// Environment variables referenced by provider keys that are not set.
    pub fn unresolved_env_refs(&self, lookup: &dyn Fn(&str) -> Option<String>) -> Vec<String> {
        self.providers
            .values()
            .filter_map(|p| match p.key_ref() {
                Some(KeyRef::Env(var)) if lookup(var).is_none_or(|v| v.trim().is_empty()) => {
                    Some(var.to_string())
                }
                _ => None,
            })
            .collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (agent, mapping) in &self.agent_model_mapping {
            if mapping.provider.trim().is_empty() || mapping.model.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "agent '{agent}' needs both provider and model"
                )));
            }
            if !(0.0..=2.0).contains(&mapping.temperature) {
                return Err(ConfigError::ValidationError(format!(
                    "agent '{agent}' temperature must be between 0.0 and 2.0"
                )));
            }
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from `WELLCOACH_CONFIG` or `~/.wellcoach/config.toml`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
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

    /// Where `load()` reads from.
    pub fn config_path() -> PathBuf {
        std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_dir().join("config.toml"))
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".wellcoach")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.models.validate()?;

        if self.pipeline.step_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "pipeline.step_timeout_secs must be > 0 (omit it to wait indefinitely)".into(),
            ));
        }

        Ok(())
    }

    /// A starter config: the fallback providers plus all three agents.
    pub fn starter() -> Self {
        let mut models = ModelConfig::fallback();
        models.agent_model_mapping.insert(
            AgentRole::Cbt.config_key().to_string(),
            AgentModelConfig::new("openai", "gpt-4o-mini", 0.7),
        );
        Self {
            models,
            pipeline: PipelineConfig {
                step_timeout_secs: Some(120),
            },
        }
    }

    /// Generate the starter config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::starter()).unwrap_or_default()
    }
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

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
