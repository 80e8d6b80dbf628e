//! In-process actions, resolved by `module` + `function` name.
//!
//! The registry is populated at startup; a local step only ever calls what was
//! registered here.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::context::ExecutionContext;
use crate::journal::preamble::runtime_component;
use crate::scenario::{LocalCall, StepExecutionResult};

/// Something a local step can call.
#[async_trait::async_trait]
pub trait Action: Send + Sync {
    /// Run the action against the current context. The returned value is
    /// the step's result payload.
    async fn call(&self, ctx: &ExecutionContext) -> Result<Value>;
}

/// Adapter so plain closures can be registered as actions.
pub struct FnAction<F>(pub F);

#[async_trait::async_trait]
impl<F> Action for FnAction<F>
where
    F: Fn(&ExecutionContext) -> Result<Value> + Send + Sync,
{
    async fn call(&self, ctx: &ExecutionContext) -> Result<Value> {
        (self.0)(ctx)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("module '{0}' not found")]
    ModuleNotFound(String),

    #[error("function '{function}' not found in module '{module}'")]
    FunctionNotFound { module: String, function: String },
}

#[derive(Default, Clone)]
pub struct ActionRegistry {
    modules: BTreeMap<String, BTreeMap<String, Arc<dyn Action>>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `runner` module of built-in actions.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_fn("runner", "noop", |_| Ok(Value::Null));
        registry.register_fn("runner", "echo_context", |ctx| Ok(ctx.to_json()));
        registry.register_fn("runner", "environment", |_| {
            Ok(serde_json::to_value(runtime_component())?)
        });
        registry
    }

    pub fn register<A>(&mut self, module: &str, function: &str, action: A)
    where
        A: Action + 'static,
    {
        self.modules
            .entry(module.to_string())
            .or_default()
            .insert(function.to_string(), Arc::new(action));
    }

    pub fn register_fn<F>(&mut self, module: &str, function: &str, f: F)
    where
        F: Fn(&ExecutionContext) -> Result<Value> + Send + Sync + 'static,
    {
        self.register(module, function, FnAction(f));
    }

    pub fn resolve(&self, module: &str, function: &str) -> Result<Arc<dyn Action>, ResolutionError> {
        let functions = self
            .modules
            .get(module)
            .ok_or_else(|| ResolutionError::ModuleNotFound(module.to_string()))?;
        functions
            .get(function)
            .cloned()
            .ok_or_else(|| ResolutionError::FunctionNotFound {
                module: module.to_string(),
                function: function.to_string(),
            })
    }

    /// `module.function` names of everything registered.
    pub fn names(&self) -> Vec<String> {
        self.modules
            .iter()
            .flat_map(|(m, fns)| fns.keys().map(move |f| format!("{}.{}", m, f)))
            .collect()
    }

    /// Resolve and call a local step.
    ///
    /// A name that does not resolve and an error returned by the action both
    /// produce a failed result; only the error text tells them apart.
    pub async fn invoke(&self, call: &LocalCall, ctx: &ExecutionContext) -> StepExecutionResult {
        let start = Instant::now();

        let action = match self.resolve(&call.module, &call.function) {
            Ok(action) => action,
            Err(e) => {
                debug!(module = %call.module, function = %call.function, error = %e, "local action unresolved");
                return StepExecutionResult::failed(e.to_string(), start.elapsed());
            }
        };

        match action.call(ctx).await {
            Ok(value) => StepExecutionResult::success(value, start.elapsed()),
            Err(e) => StepExecutionResult::failed(
                format!("{}.{} raised: {:#}", call.module, call.function, e),
                start.elapsed(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::StepStatus;
    use serde_json::json;

    fn call(module: &str, function: &str) -> LocalCall {
        LocalCall {
            module: module.into(),
            function: function.into(),
        }
    }

    #[tokio::test]
    async fn test_missing_module_names_module() {
        let registry = ActionRegistry::with_builtins();
        let result = registry.invoke(&call("pipeline", "extract"), &ExecutionContext::default()).await;
        assert_eq!(result.status(), StepStatus::Failed);
        assert_eq!(result.error(), Some("module 'pipeline' not found"));
    }

    #[tokio::test]
    async fn test_missing_function_names_both() {
        let registry = ActionRegistry::with_builtins();
        let result = registry.invoke(&call("runner", "explode"), &ExecutionContext::default()).await;
        assert_eq!(result.status(), StepStatus::Failed);
        assert_eq!(result.error(), Some("function 'explode' not found in module 'runner'"));
    }

    #[tokio::test]
    async fn test_action_error_is_captured() {
        let mut registry = ActionRegistry::new();
        registry.register_fn("pipeline", "extract", |_| anyhow::bail!("no chapters detected"));
        let result = registry.invoke(&call("pipeline", "extract"), &ExecutionContext::default()).await;
        assert_eq!(result.status(), StepStatus::Failed);
        assert_eq!(result.error(), Some("pipeline.extract raised: no chapters detected"));
        assert!(result.latency_ms() >= 0.0);
    }

    #[tokio::test]
    async fn test_action_receives_context() {
        let mut registry = ActionRegistry::new();
        registry.register_fn("pipeline", "count", |ctx| {
            let pages = ctx.get("pages").and_then(|v| v.as_i64()).unwrap_or(0);
            Ok(json!({ "doubled": pages * 2 }))
        });
        let mut ctx = ExecutionContext::default();
        ctx.insert("pages", json!(21));

        let result = registry.invoke(&call("pipeline", "count"), &ctx).await;
        assert_eq!(result.result(), Some(&json!({ "doubled": 42 })));
    }

    struct Constant(Value);

    #[async_trait::async_trait]
    impl Action for Constant {
        async fn call(&self, _ctx: &ExecutionContext) -> Result<Value> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_trait_object_registration() {
        let mut registry = ActionRegistry::new();
        registry.register("fixtures", "answer", Constant(json!(42)));
        let result = registry.invoke(&call("fixtures", "answer"), &ExecutionContext::default()).await;
        assert_eq!(result.result(), Some(&json!(42)));
        assert_eq!(registry.names(), vec!["fixtures.answer"]);
    }

    #[tokio::test]
    async fn test_builtin_environment() {
        let registry = ActionRegistry::with_builtins();
        let result = registry.invoke(&call("runner", "environment"), &ExecutionContext::default()).await;
        let payload = result.result().unwrap();
        assert_eq!(payload["component_kind"], "InfraNode");
        assert!(payload["hostname"].is_string());
    }
}
