//! TOML configuration for the scenario runner.
//!
//! Every section has compiled-in defaults, so an empty file (or no file at
//! all) is a valid configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Environment variable naming a config file to load.
pub const CONFIG_ENV: &str = "SCENARIORUNNER_CONFIG";

/// Config file picked up from the working directory.
pub const LOCAL_CONFIG: &str = "scenariorunner.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub scenarios: ScenarioSourceConfig,
}

impl RunnerConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded runner configuration");
        Ok(config)
    }

    /// Resolve configuration from, in order:
    /// 1. `explicit` (the `--config` flag). Errors here are returned.
    /// 2. The file named by `SCENARIORUNNER_CONFIG`.
    /// 3. `./scenariorunner.toml`.
    /// 4. Compiled-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "{} set but file could not be loaded, trying fallback",
                        CONFIG_ENV
                    );
                }
            }
        }

        let local = Path::new(LOCAL_CONFIG);
        if local.exists() {
            return Self::load(local);
        }

        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Where scenario records are appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub path: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("logs/system_observability_log.jsonl"),
        }
    }
}

/// HTTP client settings for `http` steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Prefix for step URLs that are plain paths.
    pub base_url: Option<String>,
    /// Per-request timeout.
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: Some("http://127.0.0.1:8000".to_string()),
            timeout_ms: 30_000,
            user_agent: format!("scenariorunner/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// What to do with a step whose `requires` keys are missing from the
/// context when it comes up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyPolicy {
    /// Attempt the step anyway.
    #[default]
    Continue,
    /// Record the step as skipped without executing it.
    Skip,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub dependency_policy: DependencyPolicy,
}

/// Optional scenario file replacing the built-in scenarios.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioSourceConfig {
    pub file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let cfg: RunnerConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.log.path, PathBuf::from("logs/system_observability_log.jsonl"));
        assert_eq!(cfg.http.timeout_ms, 30_000);
        assert_eq!(cfg.execution.dependency_policy, DependencyPolicy::Continue);
        assert!(cfg.scenarios.file.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let cfg: RunnerConfig = toml::from_str(
            r#"
            [http]
            base_url = "http://pipeline.internal:9000"

            [execution]
            dependency_policy = "skip"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.http.base_url.as_deref(), Some("http://pipeline.internal:9000"));
        assert_eq!(cfg.http.timeout_ms, 30_000);
        assert_eq!(cfg.execution.dependency_policy, DependencyPolicy::Skip);
    }

    #[test]
    fn test_load_reports_path_on_bad_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[log\npath = 1").unwrap();
        let err = RunnerConfig::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("bad.toml"));
    }

    #[test]
    fn test_resolve_explicit_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("runner.toml");
        std::fs::write(&path, "[log]\npath = \"/tmp/x.jsonl\"\n").unwrap();
        let cfg = RunnerConfig::resolve(Some(&path)).unwrap();
        assert_eq!(cfg.log.path, PathBuf::from("/tmp/x.jsonl"));
    }
}
