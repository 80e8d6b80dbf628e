//! Key/value state threaded across the steps of one run.
//!
//! Templates reference context entries as `{{key}}`. The run's
//! `trace_id` and `scenario_run_id` are also resolvable, but they are not
//! context entries.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::warn;

use crate::journal::Correlation;

#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    values: BTreeMap<String, Value>,
    correlation: Option<Correlation>,
}

impl ExecutionContext {
    /// Empty context bound to a run's correlation ids.
    pub fn for_run(correlation: &Correlation) -> Self {
        Self {
            values: BTreeMap::new(),
            correlation: Some(correlation.clone()),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Snapshot of the entries as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.values.clone().into_iter().collect())
    }

    /// Keys from `required` that are not present.
    pub fn missing<'a>(&self, required: &'a [String]) -> Vec<&'a str> {
        required
            .iter()
            .filter(|k| !self.contains(k))
            .map(String::as_str)
            .collect()
    }

    /// Merge a step's declared outputs from its result payload.
    ///
    /// For an object payload each key is looked up by name; a key the payload
    /// lacks is recorded as `null`. A non-object payload is stored under every
    /// declared key.
    pub fn merge_outputs(&mut self, step_id: &str, outputs: &[String], payload: &Value) {
        for key in outputs {
            let value = match payload {
                Value::Object(map) => match map.get(key) {
                    Some(v) => v.clone(),
                    None => {
                        warn!(step = %step_id, key = %key, "declared output missing from step result");
                        Value::Null
                    }
                },
                other => other.clone(),
            };
            self.values.insert(key.clone(), value);
        }
    }

    fn lookup(&self, key: &str) -> Option<Value> {
        if let Some(v) = self.values.get(key) {
            return Some(v.clone());
        }
        let ids = self.correlation.as_ref()?;
        match key {
            "trace_id" => Some(Value::String(ids.trace_id.clone())),
            "scenario_run_id" => Some(Value::String(ids.scenario_run_id.clone())),
            _ => None,
        }
    }

    /// Substitute `{{key}}` placeholders in `template`.
    ///
    /// String values are inserted verbatim, other values as compact JSON.
    pub fn render(&self, template: &str) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                // Unterminated placeholder, keep the text as-is.
                out.push_str(&rest[start..]);
                return Ok(out);
            };
            let key = after[..end].trim();
            match self.lookup(key) {
                Some(Value::String(s)) => out.push_str(&s),
                Some(other) => out.push_str(&other.to_string()),
                None => return Err(TemplateError::MissingKey(key.to_string())),
            }
            rest = &after[end + 2..];
        }

        out.push_str(rest);
        Ok(out)
    }

    /// Render every string inside a JSON template.
    ///
    /// A string that is exactly one placeholder is replaced by the context
    /// value itself, so numbers and objects keep their JSON type.
    pub fn render_value(&self, template: &Value) -> Result<Value, TemplateError> {
        match template {
            Value::String(s) => {
                if let Some(key) = sole_placeholder(s) {
                    return self
                        .lookup(key)
                        .ok_or_else(|| TemplateError::MissingKey(key.to_string()));
                }
                Ok(Value::String(self.render(s)?))
            }
            Value::Array(items) => items
                .iter()
                .map(|v| self.render_value(v))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut rendered = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    rendered.insert(k.clone(), self.render_value(v)?);
                }
                Ok(Value::Object(rendered))
            }
            other => Ok(other.clone()),
        }
    }
}

fn sole_placeholder(s: &str) -> Option<&str> {
    let inner = s.strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains("{{") || inner.contains("}}") {
        return None;
    }
    Some(inner.trim())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("template references missing context key '{0}'")]
    MissingKey(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> ExecutionContext {
        let mut ctx = ExecutionContext::for_run(&Correlation {
            trace_id: "trc_1".into(),
            scenario_run_id: "run_1".into(),
        });
        ctx.insert("document_id", json!("doc-42"));
        ctx.insert("pages", json!(12));
        ctx
    }

    #[test]
    fn test_render_substitutes_strings_and_numbers() {
        let rendered = ctx().render("/docs/{{document_id}}?pages={{ pages }}").unwrap();
        assert_eq!(rendered, "/docs/doc-42?pages=12");
    }

    #[test]
    fn test_render_correlation_ids() {
        assert_eq!(ctx().render("{{trace_id}}/{{scenario_run_id}}").unwrap(), "trc_1/run_1");
        assert_eq!(ctx().len(), 2);
    }

    #[test]
    fn test_render_missing_key() {
        assert_eq!(
            ctx().render("/x/{{nope}}"),
            Err(TemplateError::MissingKey("nope".into()))
        );
    }

    #[test]
    fn test_render_unterminated_placeholder_kept() {
        assert_eq!(ctx().render("a {{b").unwrap(), "a {{b");
    }

    #[test]
    fn test_render_value_keeps_json_types() {
        let body = json!({
            "document_id": "{{document_id}}",
            "pages": "{{pages}}",
            "label": "doc {{document_id}}",
            "nested": [ "{{pages}}", true ]
        });
        let rendered = ctx().render_value(&body).unwrap();
        assert_eq!(rendered["document_id"], "doc-42");
        assert_eq!(rendered["pages"], 12);
        assert_eq!(rendered["label"], "doc doc-42");
        assert_eq!(rendered["nested"][0], 12);
        assert_eq!(rendered["nested"][1], true);
    }

    #[test]
    fn test_merge_outputs_from_object() {
        let mut ctx = ExecutionContext::default();
        ctx.merge_outputs(
            "upload",
            &["document_id".to_string(), "absent".to_string()],
            &json!({"document_id": "d1", "other": 1}),
        );
        assert_eq!(ctx.get("document_id"), Some(&json!("d1")));
        assert_eq!(ctx.get("absent"), Some(&Value::Null));
        assert!(!ctx.contains("other"));
    }

    #[test]
    fn test_merge_outputs_from_scalar() {
        let mut ctx = ExecutionContext::default();
        ctx.merge_outputs("count", &["total".to_string()], &json!(7));
        assert_eq!(ctx.get("total"), Some(&json!(7)));
    }

    #[test]
    fn test_missing_keys() {
        let required = vec!["document_id".to_string(), "metadata_id".to_string()];
        assert_eq!(ctx().missing(&required), vec!["metadata_id"]);
    }
}
