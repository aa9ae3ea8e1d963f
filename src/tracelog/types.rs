//! Core types of the session log.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Current log format version, written into every header.
pub const FORMAT_VERSION: u8 = 1;

/// Direction of a captured event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Bytes the user sent to the shell.
    #[serde(rename = "IN")]
    Input,
    /// Bytes the shell produced.
    #[serde(rename = "OUT")]
    Output,
}

impl EventKind {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "IN" => Some(EventKind::Input),
            "OUT" => Some(EventKind::Output),
            _ => None,
        }
    }

    pub fn to_code(&self) -> &'static str {
        match self {
            EventKind::Input => "IN",
            EventKind::Output => "OUT",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.to_code())
    }
}

/// One timestamped, sequenced unit of captured input or output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Sequence number, starting at 0. A lost record keeps its number.
    pub seq: u64,
    /// Nanoseconds since the session's monotonic origin.
    pub ts_ns: u64,
    pub kind: EventKind,
    /// Raw bytes exactly as they crossed the proxy.
    pub payload: Vec<u8>,
}

impl Event {
    pub fn new(seq: u64, ts_ns: u64, kind: EventKind, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            seq,
            ts_ns,
            kind,
            payload: payload.into(),
        }
    }

    pub fn input(seq: u64, ts_ns: u64, payload: impl Into<Vec<u8>>) -> Self {
        Self::new(seq, ts_ns, EventKind::Input, payload)
    }

    pub fn output(seq: u64, ts_ns: u64, payload: impl Into<Vec<u8>>) -> Self {
        Self::new(seq, ts_ns, EventKind::Output, payload)
    }

    pub fn is_input(&self) -> bool {
        self.kind == EventKind::Input
    }

    pub fn is_output(&self) -> bool {
        self.kind == EventKind::Output
    }

    /// Payload decoded as UTF-8, with invalid sequences replaced.
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    /// Seconds since session start, for display.
    pub fn seconds(&self) -> f64 {
        self.ts_ns as f64 / 1_000_000_000.0
    }
}

/// First line of a session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionHeader {
    pub version: u8,
    pub shell: String,
    pub started_at: DateTime<Local>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cols: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<u16>,
}

impl SessionHeader {
    pub fn new(shell: impl Into<String>, started_at: DateTime<Local>, size: Option<(u16, u16)>) -> Self {
        Self {
            version: FORMAT_VERSION,
            shell: shell.into(),
            started_at,
            cols: size.map(|(cols, _)| cols),
            rows: size.map(|(_, rows)| rows),
        }
    }
}

/// Last line of a cleanly closed session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTrailer {
    pub ended_at: DateTime<Local>,
    pub duration_ns: u64,
    pub events: u64,
    #[serde(default)]
    pub lost_events: u64,
    #[serde(default)]
    pub exit_code: Option<i32>,
}

/// Stands in for an event whose record could not be written. Takes the
/// event's place in the sequence so later records stay gapless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LostRecord {
    pub seq: u64,
    pub kind: EventKind,
    pub bytes: u64,
}

impl From<&Event> for LostRecord {
    fn from(event: &Event) -> Self {
        Self {
            seq: event.seq,
            kind: event.kind,
            bytes: event.payload.len() as u64,
        }
    }
}

/// A metadata line: the JSON objects framing the event records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetaLine {
    Start(SessionHeader),
    End(SessionTrailer),
    Loss(LostRecord),
}
