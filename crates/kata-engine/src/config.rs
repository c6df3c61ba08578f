//! Engine configuration.

use std::path::{Path, PathBuf};

use kata_eval::{BenchmarkConfig, SandboxConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Limits for evaluation and benchmarking. Every field has a default, so
/// `{}` is a valid configuration.
///
/// ```json
/// { "sandbox": { "gas_limit": 50000000, "max_call_depth": 2000 },
///   "benchmark": { "budget_ms": 250, "min_samples": 1, "max_samples": 10000 } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sandbox: SandboxConfig,
    pub benchmark: BenchmarkConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl EngineConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_default() {
        assert_eq!(EngineConfig::from_json_str("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{ "benchmark": { "budget_ms": 40 } }"#).unwrap();
        assert_eq!(config.benchmark.budget_ms, 40);
        assert_eq!(config.benchmark.max_samples, BenchmarkConfig::default().max_samples);
        assert_eq!(config.sandbox, SandboxConfig::default());
    }

    #[test]
    fn malformed_config_is_an_error() {
        assert!(matches!(
            EngineConfig::from_json_str("{ nope"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            EngineConfig::load("/definitely/not/here.json"),
            Err(ConfigError::Io { .. })
        ));
    }
}
