//! ktrace library
//!
//! Records interactive shell sessions through a pseudo-terminal into
//! append-only event logs, and analyses those logs offline.

pub mod analysis;
pub mod capture;
pub mod cli;
pub mod config;
pub mod logging;
pub mod storage;
pub mod tracelog;

pub use analysis::{AnalysisOptions, Analyzer, SessionTrace};
pub use capture::{SessionProxy, SessionSummary};
pub use config::Config;
pub use storage::StorageManager;
pub use tracelog::{Event, EventKind, LogParser, LogWriter};
