//! Append-only JSON-lines writer for scenario records.
//!
//! Each [`RecordWriter::append`] serializes one record, writes the full line
//! and flushes before returning, so a crash mid-run leaves a valid prefix of
//! complete lines. The file handle sits behind a `tokio::sync::Mutex` so
//! appends issued in quick succession are never interleaved.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use super::record::LogRecord;
use crate::error::RunnerError;

pub struct RecordWriter {
    path: PathBuf,
    writer: Mutex<tokio::fs::File>,
}

impl RecordWriter {
    /// Open (or create) the log at `path` in append mode, creating parent
    /// directories as needed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, RunnerError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| RunnerError::LogWrite {
                    path: path.clone(),
                    source,
                })?;
        }

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| RunnerError::LogWrite {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), "scenario log opened");

        Ok(Self {
            path,
            writer: Mutex::new(file),
        })
    }

    /// Append a single record as one JSON line.
    pub async fn append(&self, record: &LogRecord) -> Result<(), RunnerError> {
        let line = encode_line(record)?;
        let mut writer = self.writer.lock().await;
        self.write_locked(&mut writer, line.as_bytes()).await
    }

    /// Append several records in order with a single write.
    pub async fn append_all(&self, records: &[LogRecord]) -> Result<usize, RunnerError> {
        let mut buf = String::new();
        for record in records {
            buf.push_str(&encode_line(record)?);
        }
        let mut writer = self.writer.lock().await;
        self.write_locked(&mut writer, buf.as_bytes()).await?;
        Ok(records.len())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_locked(&self, file: &mut tokio::fs::File, bytes: &[u8]) -> Result<(), RunnerError> {
        let map_err = |source| RunnerError::LogWrite {
            path: self.path.clone(),
            source,
        };
        file.write_all(bytes).await.map_err(map_err)?;
        file.flush().await.map_err(map_err)?;
        Ok(())
    }
}

fn encode_line(record: &LogRecord) -> Result<String, RunnerError> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    Ok(line)
}

/// Read every non-blank line of the log as a JSON value.
///
/// Lines that fail to parse are skipped; use [`super::validate`] to see them.
pub async fn read_all(path: &Path) -> std::io::Result<Vec<serde_json::Value>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    Ok(content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect())
}

/// Delete the log file. Returns `false` if it did not exist.
pub async fn clear(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
