//! Scenario registry: built once at startup, read-only afterwards.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{Scenario, ScenarioStep};
use crate::error::RunnerError;

#[derive(Debug, Clone, Default)]
pub struct ScenarioRegistry {
    scenarios: Vec<Scenario>,
}

#[derive(Debug, Deserialize)]
struct ScenarioFile {
    #[serde(default, rename = "scenario")]
    scenarios: Vec<Scenario>,
}

impl ScenarioRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with [`defaults`].
    pub fn with_defaults() -> Self {
        Self { scenarios: defaults() }
    }

    /// Parse a TOML document of `[[scenario]]` tables.
    pub fn from_toml_str(content: &str) -> Result<Self, RunnerError> {
        let file: ScenarioFile =
            toml::from_str(content).map_err(|e| RunnerError::Config(e.to_string()))?;
        let mut registry = Self::new();
        for scenario in file.scenarios {
            registry.insert(scenario)?;
        }
        Ok(registry)
    }

    /// Load a scenario file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario file: {}", path.display()))?;
        let registry = Self::from_toml_str(&content)
            .with_context(|| format!("failed to parse scenario file: {}", path.display()))?;
        info!(path = %path.display(), scenarios = registry.len(), "loaded scenario definitions");
        Ok(registry)
    }

    pub fn insert(&mut self, scenario: Scenario) -> Result<(), RunnerError> {
        if self.get(&scenario.scenario_id).is_some() {
            return Err(RunnerError::Config(format!(
                "scenario '{}' is defined more than once",
                scenario.scenario_id
            )));
        }
        self.scenarios.push(scenario);
        Ok(())
    }

    pub fn get(&self, scenario_id: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.scenario_id == scenario_id)
    }

    /// Look up a scenario, failing with [`RunnerError::UnknownScenario`].
    pub fn resolve(&self, scenario_id: &str) -> Result<&Scenario, RunnerError> {
        self.get(scenario_id)
            .ok_or_else(|| RunnerError::UnknownScenario(scenario_id.to_string()))
    }

    /// Scenarios in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.scenarios.iter().map(|s| s.scenario_id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

/// Return the out-of-box scenarios for the document pipeline.
///
/// HTTP steps use paths relative to the configured base URL.
pub fn defaults() -> Vec<Scenario> {
    let upload = || {
        ScenarioStep::http("upload_document", 2, "POST", "/api/v1/documents/upload")
            .with_name("Upload PDF document")
            .with_service("svc_pdf_converter", "ep_pdf_upload")
            .with_header("X-Correlation-ID", "{{trace_id}}")
            .with_body(json!({ "filename": "sample.pdf" }))
            .with_outputs(["document_id"])
    };
    let extract = |order| {
        ScenarioStep::http("extract_metadata", order, "POST", "/api/v1/metadata/extract")
            .with_name("Extract metadata")
            .with_service("svc_metadata_extractor", "ep_extract_metadata")
            .with_header("X-Correlation-ID", "{{trace_id}}")
            .with_body(json!({ "document_id": "{{document_id}}" }))
            .with_requires(["document_id"])
            .with_outputs(["metadata_id"])
    };
    let enrich = |order| {
        ScenarioStep::http("enrich_metadata", order, "POST", "/api/v1/metadata/enrich")
            .with_name("Enrich metadata")
            .with_service("svc_metadata_enricher", "ep_enrich_metadata")
            .with_header("X-Correlation-ID", "{{trace_id}}")
            .with_body(json!({ "metadata_id": "{{metadata_id}}" }))
            .with_requires(["metadata_id"])
            .with_outputs(["enriched_metadata_id"])
    };
    let environment = ScenarioStep::local("capture_environment", 1, "runner", "environment")
        .with_name("Capture runner environment")
        .with_outputs(["hostname"]);

    vec![
        Scenario::new(
            "single_extraction",
            "Single Extraction",
            "Upload one document and extract its metadata",
        )
        .with_process("proc_metadata_extraction")
        .with_step(environment.clone())
        .with_step(upload())
        .with_step(extract(3)),
        Scenario::new(
            "enrichment_pipeline",
            "Enrichment Pipeline",
            "Extract metadata and enrich it with cross-book references",
        )
        .with_process("proc_enrichment")
        .with_step(environment.clone())
        .with_step(upload())
        .with_step(extract(3))
        .with_step(enrich(4)),
        Scenario::new(
            "extraction_evaluation",
            "Extraction Evaluation",
            "Full pipeline from upload to an enhanced guideline",
        )
        .with_process("proc_extraction_evaluation")
        .with_step(environment)
        .with_step(upload())
        .with_step(extract(3))
        .with_step(enrich(4))
        .with_step(
            ScenarioStep::http("generate_guideline", 5, "POST", "/api/v1/guidelines/generate")
                .with_name("Generate guideline")
                .with_service("svc_guideline_generator", "ep_generate_guideline")
                .with_header("X-Correlation-ID", "{{trace_id}}")
                .with_body(json!({ "metadata_id": "{{enriched_metadata_id}}" }))
                .with_requires(["enriched_metadata_id"])
                .with_outputs(["guideline_id"]),
        )
        .with_step(
            ScenarioStep::http("enhance_guideline", 6, "POST", "/api/v1/guidelines/enhance")
                .with_name("Enhance guideline with LLM")
                .with_service("svc_llm_enhancer", "ep_enhance_guideline")
                .with_header("X-Correlation-ID", "{{trace_id}}")
                .with_body(json!({ "guideline_id": "{{guideline_id}}" }))
                .with_requires(["guideline_id"])
                .with_outputs(["enhanced_guideline_id"]),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_have_three_scenarios() {
        let registry = ScenarioRegistry::with_defaults();
        assert_eq!(
            registry.ids(),
            vec!["single_extraction", "enrichment_pipeline", "extraction_evaluation"]
        );
    }

    #[test]
    fn test_default_orders_are_unique() {
        for scenario in defaults() {
            assert!(scenario.execution_order().is_ok(), "{}", scenario.scenario_id);
            assert!(scenario.process_id.is_some());
        }
    }

    #[test]
    fn test_builtin_ids_are_distinct() {
        let mut registry = ScenarioRegistry::new();
        for scenario in defaults() {
            registry.insert(scenario).unwrap();
        }
        assert_eq!(registry.len(), ScenarioRegistry::with_defaults().len());
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = ScenarioRegistry::with_defaults();
        assert!(matches!(
            registry.resolve("nope"),
            Err(RunnerError::UnknownScenario(id)) if id == "nope"
        ));
    }

    #[test]
    fn test_duplicate_scenario_id_rejected() {
        let mut registry = ScenarioRegistry::new();
        registry.insert(Scenario::new("a", "A", "")).unwrap();
        assert!(registry.insert(Scenario::new("a", "A again", "")).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_from_toml_str() {
        let registry = ScenarioRegistry::from_toml_str(
            r#"
            [[scenario]]
            scenario_id = "smoke"
            name = "Smoke"
            description = "health then echo"

            [[scenario.steps]]
            step_id = "health"
            order = 1
            kind = "http"
            url = "/health"

            [[scenario.steps]]
            step_id = "echo"
            order = 2
            kind = "local"
            module = "runner"
            function = "echo_context"
            "#,
        )
        .unwrap();

        let smoke = registry.resolve("smoke").unwrap();
        assert_eq!(smoke.steps.len(), 2);
        assert_eq!(smoke.trigger_type, "user_action");
        assert_eq!(smoke.trigger_source, "observability_runner");
    }

    #[test]
    fn test_from_toml_str_reports_bad_document() {
        let err = ScenarioRegistry::from_toml_str("[[scenario]]\nname = 3\n").unwrap_err();
        assert!(err.is_configuration());
    }
}
