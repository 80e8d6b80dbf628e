//! Scenario orchestrator: runs a scenario's steps in order and records every
//! outcome.
//!
//! A failed step never stops the run; the remaining steps are still attempted
//! so the log holds the outcome of every step. Only configuration errors
//! (raised before the first record) and log-write failures end a run early.

use tracing::{info, warn};

use crate::config::DependencyPolicy;
use crate::context::ExecutionContext;
use crate::error::RunnerError;
use crate::executor::StepExecutor;
use crate::journal::record::now_iso;
use crate::journal::{Correlation, EventRecord, RecordWriter, RunSummaryRecord, StepMetrics};
use crate::scenario::{
    Scenario, ScenarioRegistry, ScenarioRun, ScenarioStep, StepExecutionResult, StepOutcome, StepReport,
    StepStatus,
};

/// Receives each step's outcome as soon as it is recorded.
pub trait StepObserver: Send + Sync {
    /// Called once the scenario has passed validation, before its first step.
    fn on_run(&self, _scenario: &Scenario) {}

    fn on_step(&self, scenario: &Scenario, step: &ScenarioStep, result: &StepExecutionResult);
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl StepObserver for NoopObserver {
    fn on_step(&self, _scenario: &Scenario, _step: &ScenarioStep, _result: &StepExecutionResult) {}
}

pub struct Orchestrator {
    registry: ScenarioRegistry,
    executor: StepExecutor,
    writer: RecordWriter,
    policy: DependencyPolicy,
    observer: Box<dyn StepObserver>,
}

impl Orchestrator {
    pub fn new(registry: ScenarioRegistry, executor: StepExecutor, writer: RecordWriter) -> Self {
        Self {
            registry,
            executor,
            writer,
            policy: DependencyPolicy::default(),
            observer: Box::new(NoopObserver),
        }
    }

    pub fn with_policy(mut self, policy: DependencyPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_observer(mut self, observer: impl StepObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn registry(&self) -> &ScenarioRegistry {
        &self.registry
    }

    pub fn writer(&self) -> &RecordWriter {
        &self.writer
    }

    /// Look up a scenario in the registry and run it.
    pub async fn run_by_id(&self, scenario_id: &str) -> Result<ScenarioRun, RunnerError> {
        let scenario = self.registry.resolve(scenario_id)?;
        self.run(scenario).await
    }

    /// Run every registered scenario in declaration order.
    pub async fn run_all(&self) -> Result<Vec<ScenarioRun>, RunnerError> {
        let mut runs = Vec::with_capacity(self.registry.len());
        for scenario in self.registry.iter() {
            runs.push(self.run(scenario).await?);
        }
        Ok(runs)
    }

    pub async fn run(&self, scenario: &Scenario) -> Result<ScenarioRun, RunnerError> {
        let ordered = scenario.execution_order()?;

        let ids = Correlation::generate();
        let started_at = now_iso();
        let mut ctx = ExecutionContext::for_run(&ids);
        self.observer.on_run(scenario);

        info!(
            scenario = %scenario.scenario_id,
            trace_id = %ids.trace_id,
            run_id = %ids.scenario_run_id,
            steps = ordered.len(),
            "scenario run started"
        );

        let mut steps = Vec::with_capacity(ordered.len());
        for step in ordered {
            steps.push(self.run_step(scenario, step, &ids, &mut ctx).await?);
        }

        let status = ScenarioRun::overall_status(&steps);
        let run = ScenarioRun {
            correlation: ids,
            scenario_id: scenario.scenario_id.clone(),
            started_at,
            steps,
            status,
        };
        self.writer.append(&summary_record(scenario, &run).into()).await?;

        info!(
            scenario = %scenario.scenario_id,
            trace_id = %run.trace_id(),
            status = %run.status,
            failed = run.count(StepStatus::Failed),
            "scenario run finished"
        );
        Ok(run)
    }

    async fn run_step(
        &self,
        scenario: &Scenario,
        step: &ScenarioStep,
        ids: &Correlation,
        ctx: &mut ExecutionContext,
    ) -> Result<StepReport, RunnerError> {
        let started = EventRecord::started(ids, &step.step_id)
            .with_interface(step.service_id.as_deref(), step.interface_id.as_deref());
        self.writer.append(&started.into()).await?;

        let result = self.attempt(step, ctx).await;
        let event = apply_outcome(step, ids, &result, ctx);
        self.writer.append(&event.into()).await?;
        self.observer.on_step(scenario, step, &result);

        Ok(StepReport {
            step_id: step.step_id.clone(),
            order: step.order,
            result,
        })
    }

    async fn attempt(&self, step: &ScenarioStep, ctx: &ExecutionContext) -> StepExecutionResult {
        let missing = ctx.missing(&step.requires);
        if !missing.is_empty() {
            match self.policy {
                DependencyPolicy::Skip => {
                    return StepExecutionResult::skipped(format!(
                        "missing required context keys: {}",
                        missing.join(", ")
                    ));
                }
                DependencyPolicy::Continue => {
                    warn!(step = %step.step_id, missing = ?missing, "required context keys missing, attempting anyway");
                }
            }
        }
        self.executor.execute(step, ctx).await
    }
}

/// Fold a step's outcome into the context and build the matching event.
fn apply_outcome(
    step: &ScenarioStep,
    ids: &Correlation,
    result: &StepExecutionResult,
    ctx: &mut ExecutionContext,
) -> EventRecord {
    match result.outcome() {
        StepOutcome::Success { result: payload } => {
            ctx.merge_outputs(&step.step_id, &step.outputs, payload);
            EventRecord::completed(ids, &step.step_id, StepStatus::Success, result.latency_ms())
        }
        StepOutcome::Failed { error } => {
            warn!(step = %step.step_id, error = %error, "step failed");
            EventRecord::error(ids, &step.step_id, error.as_str(), result.latency_ms())
        }
        StepOutcome::Skipped { reason } => {
            info!(step = %step.step_id, reason = %reason, "step skipped");
            EventRecord::completed(ids, &step.step_id, StepStatus::Skipped, result.latency_ms())
        }
    }
}

fn summary_record(scenario: &Scenario, run: &ScenarioRun) -> RunSummaryRecord {
    RunSummaryRecord {
        timestamp: now_iso(),
        trace_id: run.correlation.trace_id.clone(),
        scenario_run_id: run.correlation.scenario_run_id.clone(),
        scenario_id: scenario.scenario_id.clone(),
        process_id: scenario.process_id.clone(),
        trigger_type: scenario.trigger_type.clone(),
        trigger_source: scenario.trigger_source.clone(),
        status: run.status,
        started_at: run.started_at.clone(),
        steps_total: run.steps.len(),
        steps_failed: run.count(StepStatus::Failed),
        steps_skipped: run.count(StepStatus::Skipped),
        metrics: StepMetrics {
            latency_ms: run.total_latency_ms(),
        },
    }
}
