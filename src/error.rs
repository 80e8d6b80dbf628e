//! Error taxonomy for scenario runs.
//!
//! Only configuration problems and log-write failures stop a run. Everything
//! that goes wrong inside a single step is captured as a failed
//! [`StepExecutionResult`](crate::scenario::StepExecutionResult) instead.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("scenario '{scenario_id}' declares order {order} twice (steps '{first}' and '{second}')")]
    DuplicateStepOrder {
        scenario_id: String,
        order: i64,
        first: String,
        second: String,
    },

    #[error("unknown scenario '{0}'")]
    UnknownScenario(String),

    #[error("failed to write log record to {}: {source}", path.display())]
    LogWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize log record: {0}")]
    LogSerialize(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl RunnerError {
    /// True for errors raised before any step executed.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RunnerError::DuplicateStepOrder { .. }
                | RunnerError::UnknownScenario(_)
                | RunnerError::Config(_)
        )
    }
}
