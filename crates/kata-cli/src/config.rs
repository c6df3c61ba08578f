//! Resolving the engine configuration for a CLI invocation.

use std::path::{Path, PathBuf};

use kata_engine::EngineConfig;
use tracing::{debug, warn};

/// Config file picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "kata.json";

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overrides {
    pub budget_ms: Option<u64>,
    pub gas_limit: Option<u64>,
}

/// Load `explicit`, else `kata.json` in `dir` if it exists, else defaults.
/// Unreadable or malformed files fall back to defaults with a warning.
pub fn resolve(explicit: Option<&Path>, dir: &Path, overrides: Overrides) -> EngineConfig {
    let path: Option<PathBuf> = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => Some(dir.join(DEFAULT_CONFIG_FILE)).filter(|p| p.is_file()),
    };
    let mut config = match path {
        Some(path) => match EngineConfig::load(&path) {
            Ok(config) => {
                debug!(path = %path.display(), "loaded config");
                config
            }
            Err(err) => {
                warn!(%err, "using default config");
                EngineConfig::default()
            }
        },
        None => EngineConfig::default(),
    };
    if let Some(budget_ms) = overrides.budget_ms {
        config.benchmark.budget_ms = budget_ms;
    }
    if overrides.gas_limit.is_some() {
        config.sandbox.gas_limit = overrides.gas_limit;
    }
    config
}
