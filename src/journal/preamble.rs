//! Records written once before scenarios run: a `meta` header and a
//! `component` describing the node the runner executes on.

use sysinfo::System;

use super::record::{ComponentRecord, LogRecord, MetaRecord};
use super::writer::RecordWriter;
use crate::error::RunnerError;

/// Describe the host the runner is executing on.
pub fn runtime_component() -> ComponentRecord {
    let hostname = System::host_name().unwrap_or_else(|| "localhost".to_string());
    ComponentRecord {
        component_id: format!("node_{}", hostname.replace('.', "_").to_lowercase()),
        component_kind: "InfraNode".to_string(),
        provider: "local".to_string(),
        hostname,
        platform: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
        platform_version: System::os_version(),
        cwd: std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        user: std::env::var("USER").unwrap_or_else(|_| "unknown".to_string()),
        environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
    }
}

/// Append the preamble records and return how many were written.
pub async fn log_preamble(writer: &RecordWriter) -> Result<usize, RunnerError> {
    let records = [
        LogRecord::Meta(MetaRecord::default()),
        LogRecord::Component(runtime_component()),
    ];
    writer.append_all(&records).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_component_shape() {
        let node = runtime_component();
        assert!(node.component_id.starts_with("node_"));
        assert!(!node.component_id.contains('.'));
        assert_eq!(node.component_kind, "InfraNode");
        assert_eq!(node.provider, "local");
    }

    #[tokio::test]
    async fn test_log_preamble_writes_meta_then_component() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("scenario.jsonl");
        let writer = RecordWriter::open(&path).await.unwrap();

        assert_eq!(log_preamble(&writer).await.unwrap(), 2);

        let values = super::super::writer::read_all(&path).await.unwrap();
        assert_eq!(values[0]["record_type"], "meta");
        assert_eq!(values[1]["record_type"], "component");
    }
}
