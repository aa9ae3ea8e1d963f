//! Command segmentation.
//!
//! Every input event opens a new segment that collects the output chunks
//! following it, up to the next input event. Output seen before any input
//! forms a preamble segment without a command.
//!
//! Segments are a reading aid, not a reconstruction of what the shell
//! executed: line editing sends one input event per keystroke read, so a
//! single typed command can span several segments.

use std::collections::HashMap;

use serde::Serialize;

use super::text::command_text;
use crate::tracelog::{Event, EventKind};

/// One input event and the output that followed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSegment {
    pub index: usize,
    /// Sequence number of the opening input event; `None` for the preamble.
    pub input: Option<u64>,
    /// Visible text of the input event, trimmed.
    pub command: Option<String>,
    /// Sequence numbers of the output chunks in this segment.
    pub outputs: Vec<u64>,
    pub start_ns: u64,
    pub end_ns: u64,
}

impl CommandSegment {
    pub fn is_preamble(&self) -> bool {
        self.input.is_none()
    }

    pub fn duration_ns(&self) -> u64 {
        self.end_ns.saturating_sub(self.start_ns)
    }

    /// Whether the event `seq` belongs to this segment.
    pub fn contains(&self, seq: u64) -> bool {
        self.input == Some(seq) || self.outputs.contains(&seq)
    }
}

/// Group `events` into command segments, in sequence order.
pub fn segment(events: &[Event]) -> Vec<CommandSegment> {
    let mut segments: Vec<CommandSegment> = Vec::new();

    for event in events {
        match event.kind {
            EventKind::Input => segments.push(CommandSegment {
                index: segments.len(),
                input: Some(event.seq),
                command: Some(command_text(&event.payload)),
                outputs: Vec::new(),
                start_ns: event.ts_ns,
                end_ns: event.ts_ns,
            }),
            EventKind::Output => {
                if segments.is_empty() {
                    segments.push(CommandSegment {
                        index: 0,
                        input: None,
                        command: None,
                        outputs: Vec::new(),
                        start_ns: event.ts_ns,
                        end_ns: event.ts_ns,
                    });
                }
                if let Some(current) = segments.last_mut() {
                    current.outputs.push(event.seq);
                    current.end_ns = event.ts_ns;
                }
            }
        }
    }

    segments
}

/// Map from event sequence number to the index of its segment.
pub fn segment_index(segments: &[CommandSegment]) -> HashMap<u64, usize> {
    let mut index = HashMap::new();
    for segment in segments {
        if let Some(seq) = segment.input {
            index.insert(seq, segment.index);
        }
        for &seq in &segment.outputs {
            index.insert(seq, segment.index);
        }
    }
    index
}
