//! Scenario definitions and the outcomes produced by running them.

pub mod registry;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RunnerError;
use crate::journal::Correlation;

pub use registry::ScenarioRegistry;

// ---------------------------------------------------------------------------
// Step definitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCall {
    pub module: String,
    pub function: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpCall {
    pub method: String,
    /// Absolute URL, or a path joined to the configured base URL.
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<serde_json::Value>,
    /// When set, only this status counts as success instead of any 2xx.
    pub expected_status: Option<u16>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    Local(LocalCall),
    Http(HttpCall),
    /// A kind this runner does not know how to execute.
    Unsupported(String),
}

impl StepKind {
    pub fn name(&self) -> &str {
        match self {
            StepKind::Local(_) => "local",
            StepKind::Http(_) => "http",
            StepKind::Unsupported(kind) => kind,
        }
    }
}

/// One unit of work within a scenario.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawStep")]
pub struct ScenarioStep {
    pub step_id: String,
    pub name: String,
    pub order: i64,
    pub kind: StepKind,
    /// Context keys this step contributes after a successful run.
    pub outputs: Vec<String>,
    /// Context keys this step reads.
    pub requires: Vec<String>,
    pub service_id: Option<String>,
    pub interface_id: Option<String>,
}

impl ScenarioStep {
    fn with_kind(step_id: impl Into<String>, order: i64, kind: StepKind) -> Self {
        let step_id = step_id.into();
        Self {
            name: step_id.clone(),
            step_id,
            order,
            kind,
            outputs: Vec::new(),
            requires: Vec::new(),
            service_id: None,
            interface_id: None,
        }
    }

    pub fn local(
        step_id: impl Into<String>,
        order: i64,
        module: impl Into<String>,
        function: impl Into<String>,
    ) -> Self {
        Self::with_kind(
            step_id,
            order,
            StepKind::Local(LocalCall {
                module: module.into(),
                function: function.into(),
            }),
        )
    }

    pub fn http(
        step_id: impl Into<String>,
        order: i64,
        method: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self::with_kind(
            step_id,
            order,
            StepKind::Http(HttpCall {
                method: method.into(),
                url: url.into(),
                headers: BTreeMap::new(),
                body: None,
                expected_status: None,
            }),
        )
    }

    pub fn unsupported(step_id: impl Into<String>, order: i64, kind: impl Into<String>) -> Self {
        Self::with_kind(step_id, order, StepKind::Unsupported(kind.into()))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_outputs<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_requires<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_service(mut self, service_id: impl Into<String>, interface_id: impl Into<String>) -> Self {
        self.service_id = Some(service_id.into());
        self.interface_id = Some(interface_id.into());
        self
    }

    /// Attach a JSON body template. No-op for non-HTTP steps.
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        if let StepKind::Http(call) = &mut self.kind {
            call.body = Some(body);
        }
        self
    }

    /// Add a request header template. No-op for non-HTTP steps.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let StepKind::Http(call) = &mut self.kind {
            call.headers.insert(name.into(), value.into());
        }
        self
    }

    /// Require an exact status code. No-op for non-HTTP steps.
    pub fn with_expected_status(mut self, status: u16) -> Self {
        if let StepKind::Http(call) = &mut self.kind {
            call.expected_status = Some(status);
        }
        self
    }
}

/// Flat on-disk shape of a step, as written in scenario files.
#[derive(Debug, Deserialize)]
struct RawStep {
    step_id: String,
    #[serde(default)]
    name: Option<String>,
    order: i64,
    kind: String,
    #[serde(default)]
    module: Option<String>,
    #[serde(default)]
    function: Option<String>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    body: Option<serde_json::Value>,
    #[serde(default)]
    expected_status: Option<u16>,
    #[serde(default)]
    outputs: Vec<String>,
    #[serde(default)]
    requires: Vec<String>,
    #[serde(default)]
    service_id: Option<String>,
    #[serde(default)]
    interface_id: Option<String>,
}

impl TryFrom<RawStep> for ScenarioStep {
    type Error = String;

    fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
        let kind = match raw.kind.as_str() {
            "local" => {
                let (Some(module), Some(function)) = (raw.module, raw.function) else {
                    return Err(format!("local step '{}' needs both module and function", raw.step_id));
                };
                StepKind::Local(LocalCall { module, function })
            }
            "http" => {
                let Some(url) = raw.url else {
                    return Err(format!("http step '{}' needs a url", raw.step_id));
                };
                StepKind::Http(HttpCall {
                    method: raw.method.unwrap_or_else(|| "GET".to_string()),
                    url,
                    headers: raw.headers,
                    body: raw.body,
                    expected_status: raw.expected_status,
                })
            }
            other => StepKind::Unsupported(other.to_string()),
        };

        Ok(Self {
            name: raw.name.unwrap_or_else(|| raw.step_id.clone()),
            step_id: raw.step_id,
            order: raw.order,
            kind,
            outputs: raw.outputs,
            requires: raw.requires,
            service_id: raw.service_id,
            interface_id: raw.interface_id,
        })
    }
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

/// A named, ordered sequence of steps representing one workflow.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Scenario {
    pub scenario_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
    #[serde(default)]
    pub process_id: Option<String>,
    #[serde(default = "default_trigger_type")]
    pub trigger_type: String,
    #[serde(default = "default_trigger_source")]
    pub trigger_source: String,
}

fn default_trigger_type() -> String {
    "user_action".to_string()
}

fn default_trigger_source() -> String {
    "observability_runner".to_string()
}

impl Scenario {
    pub fn new(scenario_id: impl Into<String>, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            name: name.into(),
            description: description.into(),
            steps: Vec::new(),
            process_id: None,
            trigger_type: default_trigger_type(),
            trigger_source: default_trigger_source(),
        }
    }

    pub fn with_process(mut self, process_id: impl Into<String>) -> Self {
        self.process_id = Some(process_id.into());
        self
    }

    pub fn with_step(mut self, step: ScenarioStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Steps in execution order: ascending `order`, ties kept in declaration
    /// order. Duplicate `order` values are rejected.
    pub fn execution_order(&self) -> Result<Vec<&ScenarioStep>, RunnerError> {
        let mut seen: BTreeMap<i64, &str> = BTreeMap::new();
        for step in &self.steps {
            if let Some(first) = seen.insert(step.order, &step.step_id) {
                return Err(RunnerError::DuplicateStepOrder {
                    scenario_id: self.scenario_id.clone(),
                    order: step.order,
                    first: first.to_string(),
                    second: step.step_id.clone(),
                });
            }
        }

        let mut ordered: Vec<&ScenarioStep> = self.steps.iter().collect();
        ordered.sort_by_key(|s| s.order);
        Ok(ordered)
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Success => write!(f, "success"),
            StepStatus::Failed => write!(f, "failed"),
            StepStatus::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Success { result: serde_json::Value },
    Failed { error: String },
    Skipped { reason: String },
}

/// Immutable outcome of one step invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepExecutionResult {
    #[serde(flatten)]
    outcome: StepOutcome,
    latency_ms: f64,
}

impl StepExecutionResult {
    pub fn success(result: serde_json::Value, elapsed: Duration) -> Self {
        Self {
            outcome: StepOutcome::Success { result },
            latency_ms: duration_ms(elapsed),
        }
    }

    pub fn failed(error: impl Into<String>, elapsed: Duration) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "unknown error".to_string();
        }
        Self {
            outcome: StepOutcome::Failed { error },
            latency_ms: duration_ms(elapsed),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            outcome: StepOutcome::Skipped { reason: reason.into() },
            latency_ms: 0.0,
        }
    }

    pub fn outcome(&self) -> &StepOutcome {
        &self.outcome
    }

    pub fn status(&self) -> StepStatus {
        match self.outcome {
            StepOutcome::Success { .. } => StepStatus::Success,
            StepOutcome::Failed { .. } => StepStatus::Failed,
            StepOutcome::Skipped { .. } => StepStatus::Skipped,
        }
    }

    pub fn result(&self) -> Option<&serde_json::Value> {
        match &self.outcome {
            StepOutcome::Success { result } => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            StepOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }

    pub fn latency_ms(&self) -> f64 {
        self.latency_ms
    }
}

fn duration_ms(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

/// Result of one step within a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub step_id: String,
    pub order: i64,
    pub result: StepExecutionResult,
}

/// Aggregate over one execution of a scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioRun {
    #[serde(flatten)]
    pub correlation: Correlation,
    pub scenario_id: String,
    pub started_at: String,
    pub steps: Vec<StepReport>,
    pub status: StepStatus,
}

impl ScenarioRun {
    /// `failed` if any step failed, otherwise `success` (also for zero steps).
    pub fn overall_status(steps: &[StepReport]) -> StepStatus {
        if steps.iter().any(|s| s.result.status() == StepStatus::Failed) {
            StepStatus::Failed
        } else {
            StepStatus::Success
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.correlation.trace_id
    }

    pub fn scenario_run_id(&self) -> &str {
        &self.correlation.scenario_run_id
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.result.status() == status).count()
    }

    pub fn total_latency_ms(&self) -> f64 {
        self.steps.iter().map(|s| s.result.latency_ms()).sum()
    }
}
