//! Read-back validation of a scenario log.
//!
//! Lines are parsed independently. A bad line becomes an anomaly for that
//! line number; it never aborts the read.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

/// Number of characters of an offending line kept for debugging.
const ANOMALY_CONTENT_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogAnomaly {
    /// 1-based line number.
    pub line: usize,
    pub error: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogSummary {
    pub total_records: usize,
    pub record_types: BTreeMap<String, usize>,
    pub event_types: BTreeMap<String, usize>,
    pub anomalies: Vec<LogAnomaly>,
}

impl LogSummary {
    pub fn count(&self, record_type: &str) -> usize {
        self.record_types.get(record_type).copied().unwrap_or(0)
    }

    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }
}

/// Tally record and event types in the log at `path`.
///
/// A missing file yields an empty summary.
pub async fn validate(path: &Path) -> LogSummary {
    let content = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "log not found, nothing to validate");
            return LogSummary::default();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "log could not be read");
            return LogSummary {
                anomalies: vec![LogAnomaly {
                    line: 0,
                    error: format!("failed to read log: {}", e),
                    content: String::new(),
                }],
                ..LogSummary::default()
            };
        }
    };
    summarize(&content)
}

/// Tally an in-memory log body.
pub fn summarize(content: &[u8]) -> LogSummary {
    let mut summary = LogSummary::default();

    for (idx, raw) in content.split(|b| *b == b'\n').enumerate() {
        let line_no = idx + 1;
        let line = match std::str::from_utf8(raw) {
            Ok(s) => s.trim(),
            Err(e) => {
                summary.anomalies.push(LogAnomaly {
                    line: line_no,
                    error: format!("invalid UTF-8: {}", e),
                    content: String::from_utf8_lossy(raw).chars().take(ANOMALY_CONTENT_CHARS).collect(),
                });
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        let value: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                summary.anomalies.push(anomaly(line_no, e.to_string(), line));
                continue;
            }
        };

        let Some(object) = value.as_object() else {
            summary
                .anomalies
                .push(anomaly(line_no, "record is not a JSON object".into(), line));
            continue;
        };

        summary.total_records += 1;

        let record_type = match object.get("record_type").and_then(|v| v.as_str()) {
            Some(rt) => rt,
            None => {
                summary
                    .anomalies
                    .push(anomaly(line_no, "record has no record_type".into(), line));
                "unknown"
            }
        };
        *summary.record_types.entry(record_type.to_string()).or_insert(0) += 1;

        if record_type == "event" {
            check_event(&mut summary, object, line_no, line);
        }
    }

    summary
}

fn check_event(
    summary: &mut LogSummary,
    object: &serde_json::Map<String, serde_json::Value>,
    line_no: usize,
    line: &str,
) {
    let event_type = object
        .get("event_type")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    *summary.event_types.entry(event_type.to_string()).or_insert(0) += 1;

    for field in ["trace_id", "scenario_run_id", "step_id", "timestamp"] {
        if !object.get(field).is_some_and(|v| v.is_string()) {
            summary
                .anomalies
                .push(anomaly(line_no, format!("event record missing {}", field), line));
        }
    }
}

fn anomaly(line: usize, error: String, content: &str) -> LogAnomaly {
    LogAnomaly {
        line,
        error,
        content: content.chars().take(ANOMALY_CONTENT_CHARS).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_empty_summary() {
        let dir = tempfile::TempDir::new().unwrap();
        let summary = validate(&dir.path().join("absent.jsonl")).await;
        assert_eq!(summary, LogSummary::default());
        assert_eq!(summary.total_records, 0);
        assert!(summary.is_clean());
    }

    #[test]
    fn test_counts_record_types() {
        let body = concat!(
            "{\"record_type\":\"component\",\"name\":\"test1\"}\n",
            "{\"record_type\":\"component\",\"name\":\"test2\"}\n",
            "\n",
            "{\"record_type\":\"relationship\",\"from\":\"a\",\"to\":\"b\"}\n",
        );
        let summary = summarize(body.as_bytes());
        assert_eq!(summary.total_records, 3);
        assert_eq!(summary.count("component"), 2);
        assert_eq!(summary.count("relationship"), 1);
        assert!(summary.is_clean());
    }

    #[test]
    fn test_bad_line_is_anomaly_not_fatal() {
        let body = "{\"record_type\":\"meta\"}\n{not json\n{\"record_type\":\"meta\"}\n";
        let summary = summarize(body.as_bytes());
        assert_eq!(summary.total_records, 2);
        assert_eq!(summary.anomalies.len(), 1);
        assert_eq!(summary.anomalies[0].line, 2);
        assert_eq!(summary.anomalies[0].content, "{not json");
    }

    #[test]
    fn test_missing_record_type_counts_as_unknown() {
        let summary = summarize(b"{\"name\":\"x\"}\n[1,2]\n");
        assert_eq!(summary.count("unknown"), 1);
        assert_eq!(summary.anomalies.len(), 2);
        assert_eq!(summary.anomalies[1].line, 2);
    }

    #[test]
    fn test_event_without_correlation_is_flagged() {
        let body = concat!(
            "{\"record_type\":\"event\",\"event_type\":\"StepStarted\",\"timestamp\":\"t\",",
            "\"trace_id\":\"trc_1\",\"step_id\":\"s\"}\n"
        );
        let summary = summarize(body.as_bytes());
        assert_eq!(summary.event_types.get("StepStarted"), Some(&1));
        assert_eq!(summary.anomalies.len(), 1);
        assert!(summary.anomalies[0].error.contains("scenario_run_id"));
    }

    #[test]
    fn test_long_line_content_is_truncated() {
        let long = format!("{{\"record_type\": {}", "9".repeat(500));
        let summary = summarize(long.as_bytes());
        assert_eq!(summary.anomalies[0].content.chars().count(), ANOMALY_CONTENT_CHARS);
    }
}
