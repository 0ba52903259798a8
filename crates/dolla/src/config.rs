// File: src/config.rs
// Purpose: Configuration parsing from dolla.toml

use anyhow::{Context, Result};
use dolla_parser::MissingReference;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub evaluation: EvaluationConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Condition evaluation policy
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EvaluationConfig {
    /// What `input["absent"]` evaluates to: "fail" (default) or "null"
    #[serde(default)]
    pub missing_references: MissingReference,
}

/// Output slot configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Tag applied to slots that carry none (default: no transform)
    #[serde(default)]
    pub default_tag: String,

    /// Emit a warning for every skipped directive or slot
    #[serde(default = "default_true")]
    pub log_failures: bool,
}

fn default_true() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_tag: String::new(),
            log_failures: default_true(),
        }
    }
}

impl Config {
    /// Load configuration from dolla.toml
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // If file doesn't exist or is empty, return default config
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Load configuration from default path (./dolla.toml)
    pub fn load_default() -> Result<Self> {
        Self::load("dolla.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.evaluation.missing_references, MissingReference::Fail);
        assert_eq!(config.output.default_tag, "");
        assert!(config.output.log_failures);
    }

    #[test]
    fn test_empty_config() {
        let config = toml::from_str::<Config>("").unwrap_or_default();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_custom_config() {
        let toml = r#"
            [evaluation]
            missing_references = "null"

            [output]
            default_tag = "escape"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.evaluation.missing_references, MissingReference::Null);
        assert_eq!(config.output.default_tag, "escape");
        assert!(config.output.log_failures);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let config = Config::load("does/not/exist/dolla.toml").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let path = std::env::temp_dir().join(format!("dolla-config-{}.toml", std::process::id()));
        fs::write(&path, "[evaluation]\nmissing_references = \"sometimes\"\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        fs::remove_file(&path).ok();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
