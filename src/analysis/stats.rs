//! Duration, line counts and command frequency.

use std::collections::HashMap;

use serde::Serialize;

use super::text::command_text;
use crate::tracelog::{Event, EventKind};

/// Last event timestamp minus first; zero for fewer than two events.
pub fn duration_ns(events: &[Event]) -> u64 {
    match (events.first(), events.last()) {
        (Some(first), Some(last)) if events.len() > 1 => last.ts_ns.saturating_sub(first.ts_ns),
        _ => 0,
    }
}

/// Event, byte and line totals per direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LineCounts {
    pub events: u64,
    pub input_events: u64,
    pub output_events: u64,
    pub input_bytes: u64,
    pub output_bytes: u64,
    /// Lines submitted: `\r`, `\n` or `\r\n` terminated, plus a trailing fragment.
    pub input_lines: u64,
    /// Lines printed: `\n` terminated, plus a trailing fragment.
    pub output_lines: u64,
}

/// Counts lines across a byte stream split over several events.
#[derive(Default)]
struct LineCounter {
    lines: u64,
    last: Option<u8>,
}

impl LineCounter {
    fn feed(&mut self, bytes: &[u8], accept_cr: bool) {
        for &b in bytes {
            let ends_line = match b {
                b'\n' => !(accept_cr && self.last == Some(b'\r')),
                b'\r' => accept_cr,
                _ => false,
            };
            if ends_line {
                self.lines += 1;
            }
            self.last = Some(b);
        }
    }

    fn finish(&self, accept_cr: bool) -> u64 {
        match self.last {
            None | Some(b'\n') => self.lines,
            Some(b'\r') if accept_cr => self.lines,
            Some(_) => self.lines + 1,
        }
    }
}

pub fn line_counts(events: &[Event]) -> LineCounts {
    let mut counts = LineCounts::default();
    let mut input = LineCounter::default();
    let mut output = LineCounter::default();

    for event in events {
        counts.events += 1;
        let bytes = event.payload.len() as u64;
        match event.kind {
            EventKind::Input => {
                counts.input_events += 1;
                counts.input_bytes += bytes;
                input.feed(&event.payload, true);
            }
            EventKind::Output => {
                counts.output_events += 1;
                counts.output_bytes += bytes;
                output.feed(&event.payload, false);
            }
        }
    }

    counts.input_lines = input.finish(true);
    counts.output_lines = output.finish(false);
    counts
}

/// How often a command key was seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrequencyEntry {
    pub key: String,
    pub count: u64,
}

/// First whitespace-delimited token of an input event's visible text.
pub fn frequency_key(payload: &[u8]) -> Option<String> {
    command_text(payload)
        .split_whitespace()
        .next()
        .map(str::to_string)
}

/// Input events counted by [`frequency_key`], most frequent first, ties in
/// first-seen order, at most `top_n` entries.
pub fn frequency(events: &[Event], top_n: usize) -> Vec<FrequencyEntry> {
    let mut order: Vec<FrequencyEntry> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();

    for event in events.iter().filter(|e| e.is_input()) {
        let Some(key) = frequency_key(&event.payload) else {
            continue;
        };
        match position.get(&key) {
            Some(&i) => order[i].count += 1,
            None => {
                position.insert(key.clone(), order.len());
                order.push(FrequencyEntry { key, count: 1 });
            }
        }
    }

    // Stable sort keeps first-seen order among equal counts.
    order.sort_by(|a, b| b.count.cmp(&a.count));
    order.truncate(top_n);
    order
}
