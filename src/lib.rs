//! scenariorunner -- synthetic-user scenario runner for the document pipeline.
//!
//! Runs scenarios (ordered local or HTTP steps) strictly one step at a time,
//! threads a key/value context between steps, and appends every step's
//! outcome to a JSON-lines log that can be validated afterwards.

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod journal;
pub mod orchestrator;
pub mod scenario;

use anyhow::Result;

pub use config::RunnerConfig;
pub use error::RunnerError;
pub use orchestrator::{Orchestrator, StepObserver};
pub use scenario::{Scenario, ScenarioRegistry, ScenarioRun, ScenarioStep, StepExecutionResult, StepStatus};

/// Scenario registry named by the config, or the built-in defaults.
pub fn load_registry(config: &RunnerConfig) -> Result<ScenarioRegistry> {
    match &config.scenarios.file {
        Some(path) => ScenarioRegistry::load(path),
        None => Ok(ScenarioRegistry::with_defaults()),
    }
}

/// Assemble an orchestrator from configuration: registry, executor with the
/// built-in actions, and the log writer.
pub async fn build(config: &RunnerConfig) -> Result<Orchestrator> {
    tracing::info!(log = %config.log.path.display(), "Opening scenario log");
    let registry = load_registry(config)?;
    let executor = executor::StepExecutor::from_config(&config.http)?;
    let writer = journal::RecordWriter::open(&config.log.path).await?;

    Ok(Orchestrator::new(registry, executor, writer).with_policy(config.execution.dependency_policy))
}
