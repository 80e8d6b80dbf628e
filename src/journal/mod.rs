//! Append-only scenario log: record kinds, the writer, and read-back
//! validation.

pub mod preamble;
pub mod record;
pub mod validate;
pub mod writer;

pub use record::{Correlation, EventKind, EventRecord, LogRecord, RunSummaryRecord, StepMetrics};
pub use validate::{validate, LogAnomaly, LogSummary};
pub use writer::RecordWriter;
