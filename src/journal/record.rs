//! Record kinds written to the scenario log.
//!
//! Every record is a single JSON object discriminated by `record_type`.
//! Step events are further discriminated by `event_type`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scenario::StepStatus;

/// Version of the record layout written by this crate.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Identifies this crate as the producer in `meta` records.
pub const GENERATOR_ID: &str = "scenariorunner_v1";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Generate a short prefixed identifier, e.g. `trc_9f1c0a7e5b2d4c18`.
pub fn new_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &hex[..16])
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

// ---------------------------------------------------------------------------
// LogRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record_type", rename_all = "snake_case")]
pub enum LogRecord {
    Meta(MetaRecord),
    Component(ComponentRecord),
    Event(EventRecord),
    ScenarioRun(RunSummaryRecord),
}

impl LogRecord {
    /// The `record_type` discriminator as written to the log.
    pub fn record_type(&self) -> &'static str {
        match self {
            LogRecord::Meta(_) => "meta",
            LogRecord::Component(_) => "component",
            LogRecord::Event(_) => "event",
            LogRecord::ScenarioRun(_) => "scenario_run",
        }
    }
}

impl From<EventRecord> for LogRecord {
    fn from(event: EventRecord) -> Self {
        LogRecord::Event(event)
    }
}

impl From<RunSummaryRecord> for LogRecord {
    fn from(summary: RunSummaryRecord) -> Self {
        LogRecord::ScenarioRun(summary)
    }
}

/// Header record describing who produced the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaRecord {
    pub schema_version: String,
    pub generated_by: String,
    pub created_at: String,
}

impl Default for MetaRecord {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            generated_by: GENERATOR_ID.to_string(),
            created_at: now_iso(),
        }
    }
}

/// Runtime node the scenarios were driven from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub component_id: String,
    pub component_kind: String,
    pub provider: String,
    pub hostname: String,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_version: Option<String>,
    pub cwd: String,
    pub user: String,
    pub environment: String,
}

// ---------------------------------------------------------------------------
// Step events
// ---------------------------------------------------------------------------

/// Correlation identifiers shared by every record of one scenario run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    pub trace_id: String,
    pub scenario_run_id: String,
}

impl Correlation {
    pub fn generate() -> Self {
        Self {
            trace_id: new_id("trc"),
            scenario_run_id: new_id("run"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepMetrics {
    pub latency_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum EventKind {
    StepStarted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        service_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        interface_id: Option<String>,
    },
    StepCompleted {
        status: StepStatus,
        metrics: StepMetrics,
    },
    StepError {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metrics: Option<StepMetrics>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: String,
    pub trace_id: String,
    pub scenario_run_id: String,
    pub step_id: String,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl EventRecord {
    fn new(ids: &Correlation, step_id: &str, kind: EventKind) -> Self {
        Self {
            timestamp: now_iso(),
            trace_id: ids.trace_id.clone(),
            scenario_run_id: ids.scenario_run_id.clone(),
            step_id: step_id.to_string(),
            kind,
        }
    }

    pub fn started(ids: &Correlation, step_id: &str) -> Self {
        Self::new(
            ids,
            step_id,
            EventKind::StepStarted {
                service_id: None,
                interface_id: None,
            },
        )
    }

    /// Attach the service and interface a started step targets.
    /// Has no effect on other event kinds.
    pub fn with_interface(mut self, service: Option<&str>, interface: Option<&str>) -> Self {
        if let EventKind::StepStarted {
            service_id,
            interface_id,
        } = &mut self.kind
        {
            *service_id = service.map(str::to_string);
            *interface_id = interface.map(str::to_string);
        }
        self
    }

    pub fn completed(ids: &Correlation, step_id: &str, status: StepStatus, latency_ms: f64) -> Self {
        Self::new(
            ids,
            step_id,
            EventKind::StepCompleted {
                status,
                metrics: StepMetrics { latency_ms },
            },
        )
    }

    pub fn error(ids: &Correlation, step_id: &str, error: impl Into<String>, latency_ms: f64) -> Self {
        Self::new(
            ids,
            step_id,
            EventKind::StepError {
                error: error.into(),
                metrics: Some(StepMetrics { latency_ms }),
            },
        )
    }

    /// Name of the event as written in `event_type`.
    pub fn event_type(&self) -> &'static str {
        match self.kind {
            EventKind::StepStarted { .. } => "StepStarted",
            EventKind::StepCompleted { .. } => "StepCompleted",
            EventKind::StepError { .. } => "StepError",
        }
    }
}

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

/// Closing record of one run. `timestamp` is when the run finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummaryRecord {
    pub timestamp: String,
    pub trace_id: String,
    pub scenario_run_id: String,
    pub scenario_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_id: Option<String>,
    pub trigger_type: String,
    pub trigger_source: String,
    pub status: StepStatus,
    pub started_at: String,
    pub steps_total: usize,
    pub steps_failed: usize,
    pub steps_skipped: usize,
    pub metrics: StepMetrics,
}
