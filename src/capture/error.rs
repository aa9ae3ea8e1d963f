//! Capture pipeline errors.

use std::path::PathBuf;

pub use crate::tracelog::WriteError;

/// The session could not be started. Fatal to the session.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("failed to allocate a pseudo-terminal: {0}")]
    OpenPty(#[source] std::io::Error),

    #[error("failed to start shell {shell}: {source}")]
    Shell {
        shell: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open session log {path}: {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: WriteError,
    },

    #[error("failed to set up relay: {0}")]
    Relay(#[source] std::io::Error),
}
