//! Sandbox configuration.
//!
//! [`SandboxConfig`] controls which native modules are pre-bound into the
//! namespace and the resource limits applied to every snippet.  Sensible
//! defaults are provided via the [`Default`] implementation, and a
//! builder-style API allows callers to customise individual fields fluently.

use serde::{Deserialize, Serialize};

/// Module allow-list and resource limits for the sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Native modules bound into the namespace at construction.
    ///
    /// Names that do not match a known module are skipped with a warning.
    ///
    /// Default: **`math`, `json`, `datetime`, `statistics`, `re`**.
    pub allowed_modules: Vec<String>,

    /// Maximum fuel (abstract step count) per execution.
    ///
    /// Every statement and every loop iteration consumes one unit; building
    /// large ranges consumes one unit per element.
    ///
    /// Default: **100 000**.
    pub max_fuel: u64,

    /// Maximum number of stdout bytes captured per execution.
    ///
    /// Default: **64 KiB**.
    pub max_output_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            allowed_modules: ["math", "json", "datetime", "statistics", "re"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_fuel: 100_000,
            max_output_bytes: 64 * 1024,
        }
    }
}

impl SandboxConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the module allow-list.
    pub fn with_allowed_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_modules = modules.into_iter().map(Into::into).collect();
        self
    }

    /// Set the maximum fuel (step count).
    pub fn with_max_fuel(mut self, fuel: u64) -> Self {
        self.max_fuel = fuel;
        self
    }

    /// Set the stdout capture limit (in bytes).
    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = SandboxConfig::default();
        assert_eq!(cfg.allowed_modules.len(), 5);
        assert!(cfg.allowed_modules.iter().any(|m| m == "math"));
        assert_eq!(cfg.max_fuel, 100_000);
        assert_eq!(cfg.max_output_bytes, 64 * 1024);
    }

    #[test]
    fn builder_chaining() {
        let cfg = SandboxConfig::new()
            .with_allowed_modules(["math"])
            .with_max_fuel(500)
            .with_max_output_bytes(128);
        assert_eq!(cfg.allowed_modules, vec!["math".to_string()]);
        assert_eq!(cfg.max_fuel, 500);
        assert_eq!(cfg.max_output_bytes, 128);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg: SandboxConfig = serde_json::from_str(r#"{"max_fuel": 10}"#).unwrap();
        assert_eq!(cfg.max_fuel, 10);
        assert_eq!(cfg.max_output_bytes, 64 * 1024);
        assert_eq!(cfg.allowed_modules.len(), 5);
    }
}
