//! Analysis engine errors.

use std::path::PathBuf;

use crate::tracelog::LogError;

/// A search pattern did not compile. Local to the one query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid search pattern {pattern:?}: {message}")]
pub struct PatternError {
    pub pattern: String,
    pub message: String,
}

/// Errors from opening a trace or running a query against it.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Log(#[from] LogError),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("no event with sequence number {0} in this session")]
    UnknownEvent(u64),

    #[error("failed to access bookmarks {path}: {source}")]
    BookmarkIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid bookmark file {path}: {source}")]
    BookmarkFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid export record on line {line}: {message}")]
    Import { line: usize, message: String },

    #[error("export failed: {0}")]
    Io(#[from] std::io::Error),
}
