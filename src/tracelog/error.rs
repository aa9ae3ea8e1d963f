//! Session log errors.

use std::path::PathBuf;

/// A record's framing is internally inconsistent somewhere before EOF.
///
/// Truncation at end of file is never reported through this type; the parser
/// discards the trailing fragment and counts it instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("corrupt log at line {line} (byte offset {offset}): {reason}")]
pub struct CorruptLogError {
    /// 1-based line number of the offending record.
    pub line: usize,
    /// Byte offset of the start of the offending line.
    pub offset: u64,
    /// Zero-based index of the event record, when the line was a record.
    pub record_index: Option<u64>,
    pub reason: String,
}

/// Errors produced while reading or writing a session log.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("failed to open log {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read log: {0}")]
    Read(#[source] std::io::Error),

    #[error(transparent)]
    Corrupt(#[from] CorruptLogError),
}

/// An append or close failed at the I/O layer.
///
/// Records written before the failure stay intact; the writer rolls the file
/// back to the end of the last complete record.
#[derive(Debug, thiserror::Error)]
#[error("failed to write {what}: {source}")]
pub struct WriteError {
    /// What was being written, e.g. `record 42` or `trailer`.
    pub what: String,
    #[source]
    pub source: std::io::Error,
}

impl WriteError {
    pub fn new(what: impl Into<String>, source: std::io::Error) -> Self {
        Self {
            what: what.into(),
            source,
        }
    }
}
