//! Session capture pipeline.
//!
//! # Structure
//!
//! - `pty` - pseudo-terminal allocation and shell spawning
//! - `proxy` - the [`SessionProxy`] and its relay threads
//! - `recorder` - sequencing and output coalescing ([`EventRecorder`])
//! - `journal` - the single thread that appends to the log
//! - `signals` - termination/resize signal flags
//! - `terminal` - raw mode and size of the real terminal

pub mod error;
mod journal;
pub mod pty;
mod proxy;
mod recorder;
pub mod signals;
pub mod terminal;

pub use error::{SpawnError, WriteError};
pub use journal::{CaptureHealth, LossMarker};
pub use proxy::{CloseHandle, ProxyConfig, RunningSession, SessionProxy, SessionSummary, TerminalEndpoints};
pub use pty::PtySize;
pub use recorder::{CoalesceConfig, EventRecorder, JournalMsg, SessionClock, SharedRecorder};
pub use signals::SignalWatch;
pub use terminal::RawModeGuard;
