//! Step executor: turns one step definition into one outcome.

pub mod http;
pub mod local;

use std::time::Duration;

use anyhow::Result;

use crate::config::HttpConfig;
use crate::context::ExecutionContext;
use crate::scenario::{ScenarioStep, StepExecutionResult, StepKind};

pub use self::http::HttpStepRunner;
pub use self::local::{Action, ActionRegistry, FnAction, ResolutionError};

pub struct StepExecutor {
    actions: ActionRegistry,
    http: HttpStepRunner,
}

impl StepExecutor {
    pub fn new(actions: ActionRegistry, http: HttpStepRunner) -> Self {
        Self { actions, http }
    }

    /// Executor with the built-in actions and an HTTP client for `config`.
    pub fn from_config(config: &HttpConfig) -> Result<Self> {
        Ok(Self::new(ActionRegistry::with_builtins(), HttpStepRunner::new(config)?))
    }

    /// Execute a step. Always yields exactly one result; nothing is raised.
    pub async fn execute(&self, step: &ScenarioStep, ctx: &ExecutionContext) -> StepExecutionResult {
        match &step.kind {
            StepKind::Local(call) => self.actions.invoke(call, ctx).await,
            StepKind::Http(call) => self.http.invoke(call, ctx).await,
            StepKind::Unsupported(kind) => {
                StepExecutionResult::failed(format!("unsupported step kind '{}'", kind), Duration::ZERO)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::StepStatus;

    fn executor() -> StepExecutor {
        StepExecutor::from_config(&HttpConfig {
            base_url: None,
            ..HttpConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_unsupported_kind_fails() {
        let step = ScenarioStep::unsupported("q", 1, "grpc");
        let result = executor().execute(&step, &ExecutionContext::default()).await;
        assert_eq!(result.status(), StepStatus::Failed);
        assert_eq!(result.error(), Some("unsupported step kind 'grpc'"));
        assert_eq!(result.latency_ms(), 0.0);
    }

    #[tokio::test]
    async fn test_dispatches_local() {
        let step = ScenarioStep::local("n", 1, "runner", "noop");
        let result = executor().execute(&step, &ExecutionContext::default()).await;
        assert_eq!(result.status(), StepStatus::Success);
        assert_eq!(result.result(), Some(&serde_json::Value::Null));
    }
}
