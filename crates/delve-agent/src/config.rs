//! Agent configuration.
//!
//! [`AgentConfig`] is read from a TOML file, then selectively overridden by
//! `DELVE_*` environment variables, then validated.  Every field has a
//! default, so an empty file is a valid configuration.

use std::path::Path;

use delve_sandbox::SandboxConfig;
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// Environment variable overriding [`AgentConfig::model`].
pub const ENV_MODEL: &str = "DELVE_MODEL";
/// Environment variable overriding [`AgentConfig::max_iterations`].
pub const ENV_MAX_ITERATIONS: &str = "DELVE_MAX_ITERATIONS";
/// Environment variable overriding the sandbox module allow-list
/// (comma-separated).
pub const ENV_ALLOWED_MODULES: &str = "DELVE_ALLOWED_MODULES";

/// Configuration for one controller run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// The model identifier sent with every request.
    pub model: String,

    /// Maximum number of loop iterations before the task is abandoned.
    /// Must be at least 1.
    pub max_iterations: u32,

    /// Sampling temperature.
    pub temperature: f32,

    /// Maximum tokens per model turn.
    pub max_tokens: u32,

    /// System instructions.  Generated from the tool schemas when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Sandbox allow-list and limits.
    pub sandbox: SandboxConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-7-sonnet-latest".into(),
            max_iterations: 20,
            temperature: 0.1,
            max_tokens: 4096,
            system_prompt: None,
            sandbox: SandboxConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Read and validate a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), model = %config.model, "config loaded");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DELVE_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply `DELVE_*` overrides from an arbitrary lookup, then validate.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup(ENV_MODEL).filter(|m| !m.trim().is_empty()) {
            self.model = model.trim().to_owned();
        }

        if let Some(raw) = lookup(ENV_MAX_ITERATIONS) {
            self.max_iterations = raw.trim().parse().map_err(|_| AgentError::ConfigError {
                reason: format!("{ENV_MAX_ITERATIONS} must be a positive integer, got `{raw}`"),
            })?;
        }

        if let Some(raw) = lookup(ENV_ALLOWED_MODULES) {
            self.sandbox.allowed_modules = raw
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(String::from)
                .collect();
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(AgentError::ConfigError {
                reason: "max_iterations must be at least 1".into(),
            });
        }
        if self.model.trim().is_empty() {
            return Err(AgentError::ConfigError {
                reason: "model must not be empty".into(),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AgentError::ConfigError {
                reason: format!("temperature {} is outside 0.0..=2.0", self.temperature),
            });
        }
        Ok(())
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_sandbox(mut self, sandbox: SandboxConfig) -> Self {
        self.sandbox = sandbox;
        self
    }
}
