//! Session log format: one self-delimited record per line.
//!
//! A `.ktr` file is an append-only sequence of event records, optionally
//! framed by a JSON header on the first line and a JSON trailer on the last.
//!
//! # Format
//!
//! ```text
//! {"type":"start","version":1,"shell":"/bin/bash","started_at":"...","cols":80,"rows":24}
//! 0	1200345	OUT	dXNlckBob3N0OiQg
//! 1	2004381122	IN	bHMNCg==
//! {"type":"loss","seq":2,"kind":"OUT","bytes":512}
//! 3	2004399870	OUT	Li4uDQo=
//! {"type":"end","ended_at":"...","duration_ns":2004399870,"events":3,"lost_events":1,"exit_code":0}
//! ```
//!
//! Record fields are tab-separated: sequence number, monotonic nanoseconds
//! since session start, kind (`IN` or `OUT`), and the base64 payload. A
//! `loss` line takes the place of a record the writer failed to append.
//!
//! # Structure
//!
//! - `types` - events, kinds and the header/trailer/loss metadata lines
//! - `writer` - the append-only [`LogWriter`]
//! - `reader` - the lazy, restartable [`LogParser`]
//! - `integrity` - whole-file diagnosis for `ktrace verify`

pub mod error;
pub mod integrity;
mod reader;
mod types;
mod writer;

pub use error::{CorruptLogError, LogError, WriteError};
pub use reader::{LogParser, ParseReport, ParsedLog, Records};
pub use types::{Event, EventKind, LostRecord, MetaLine, SessionHeader, SessionTrailer, FORMAT_VERSION};
pub use writer::LogWriter;

/// File extension used for session logs.
pub const LOG_EXTENSION: &str = "ktr";
