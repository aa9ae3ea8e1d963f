//! JSON-lines export of events, and re-import.
//!
//! One object per line:
//!
//! ```text
//! {"seq":0,"ts_ns":1200345,"kind":"OUT","payload":"user@host:~$ "}
//! {"seq":1,"ts_ns":2004381122,"kind":"IN","payload":"ls\r","note":"first look"}
//! {"seq":2,"ts_ns":2004999000,"kind":"OUT","payload_b64":"/w=="}
//! ```
//!
//! Payloads that are valid UTF-8 are written as JSON strings, anything else
//! as base64 in `payload_b64`, so every byte survives the round trip.

use std::io::{BufRead, Write};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use super::bookmark::BookmarkSet;
use super::error::AnalysisError;
use crate::tracelog::{Event, EventKind, LogParser};

/// Which events an export includes. The default includes all of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportFilter {
    pub kind: Option<EventKind>,
    /// Inclusive lower bound on sequence numbers.
    pub from_seq: Option<u64>,
    /// Inclusive upper bound on sequence numbers.
    pub to_seq: Option<u64>,
    pub bookmarked_only: bool,
}

impl ExportFilter {
    pub fn includes(&self, event: &Event, bookmarks: Option<&BookmarkSet>) -> bool {
        if self.kind.is_some_and(|kind| kind != event.kind) {
            return false;
        }
        if self.from_seq.is_some_and(|from| event.seq < from) {
            return false;
        }
        if self.to_seq.is_some_and(|to| event.seq > to) {
            return false;
        }
        if self.bookmarked_only && !bookmarks.is_some_and(|b| b.contains(event.seq)) {
            return false;
        }
        true
    }

    /// Past the upper bound nothing further can match.
    fn is_past_end(&self, event: &Event) -> bool {
        self.to_seq.is_some_and(|to| event.seq > to)
    }
}

/// One exported line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub seq: u64,
    pub ts_ns: u64,
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_b64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ExportRecord {
    pub fn from_event(event: &Event, note: Option<&str>) -> Self {
        let (payload, payload_b64) = match std::str::from_utf8(&event.payload) {
            Ok(text) => (Some(text.to_string()), None),
            Err(_) => (None, Some(STANDARD.encode(&event.payload))),
        };
        Self {
            seq: event.seq,
            ts_ns: event.ts_ns,
            kind: event.kind,
            payload,
            payload_b64,
            note: note.map(str::to_string),
        }
    }

    pub fn to_event(&self) -> Result<Event, String> {
        let payload = match (&self.payload, &self.payload_b64) {
            (Some(text), None) => text.as_bytes().to_vec(),
            (None, Some(encoded)) => STANDARD
                .decode(encoded)
                .map_err(|e| format!("invalid payload_b64: {}", e))?,
            (Some(_), Some(_)) => return Err("both payload and payload_b64 present".to_string()),
            (None, None) => return Err("missing payload".to_string()),
        };
        Ok(Event::new(self.seq, self.ts_ns, self.kind, payload))
    }
}

fn write_record<W: Write>(out: &mut W, event: &Event, bookmarks: Option<&BookmarkSet>) -> std::io::Result<()> {
    let note = bookmarks.and_then(|b| b.note(event.seq));
    serde_json::to_writer(&mut *out, &ExportRecord::from_event(event, note))?;
    out.write_all(b"\n")
}

/// Export already-parsed events. Returns the number of lines written.
pub fn export_events<'a, W: Write>(
    events: impl IntoIterator<Item = &'a Event>,
    mut out: W,
    filter: &ExportFilter,
    bookmarks: Option<&BookmarkSet>,
) -> std::io::Result<u64> {
    let mut written = 0;
    for event in events {
        if filter.is_past_end(event) {
            break;
        }
        if filter.includes(event, bookmarks) {
            write_record(&mut out, event, bookmarks)?;
            written += 1;
        }
    }
    out.flush()?;
    Ok(written)
}

/// Export straight from the log file, one record at a time, without
/// loading the session into memory.
pub fn export_log<W: Write>(
    parser: &LogParser,
    mut out: W,
    filter: &ExportFilter,
    bookmarks: Option<&BookmarkSet>,
) -> Result<u64, AnalysisError> {
    let mut written = 0;
    for event in parser.records()? {
        let event = event?;
        if filter.is_past_end(&event) {
            break;
        }
        if filter.includes(&event, bookmarks) {
            write_record(&mut out, &event, bookmarks)?;
            written += 1;
        }
    }
    out.flush()?;
    Ok(written)
}

/// Records of an export paired with their 1-based line numbers.
fn read_records<R: BufRead>(input: R) -> Result<Vec<(usize, ExportRecord)>, AnalysisError> {
    let mut records = Vec::new();
    for (i, line) in input.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ExportRecord = serde_json::from_str(&line).map_err(|e| AnalysisError::Import {
            line: i + 1,
            message: e.to_string(),
        })?;
        records.push((i + 1, record));
    }
    Ok(records)
}

/// Read an export back into records. Blank lines are skipped.
pub fn import_records<R: BufRead>(input: R) -> Result<Vec<ExportRecord>, AnalysisError> {
    Ok(read_records(input)?.into_iter().map(|(_, record)| record).collect())
}

/// Read an export back into events.
pub fn import<R: BufRead>(input: R) -> Result<Vec<Event>, AnalysisError> {
    read_records(input)?
        .into_iter()
        .map(|(line, record)| {
            record
                .to_event()
                .map_err(|message| AnalysisError::Import { line, message })
        })
        .collect()
}
