//! Search over event payloads.

use rayon::prelude::*;
use regex::{Regex, RegexBuilder};
use serde::Serialize;

use super::error::PatternError;
use super::segment::{segment_index, CommandSegment};
use super::text::plain_text;
use super::AnalysisOptions;
use crate::tracelog::{Event, EventKind};

/// Compiled search pattern.
#[derive(Debug, Clone)]
pub struct Matcher {
    regex: Regex,
}

impl Matcher {
    /// Compile `pattern`, escaping it first unless regex mode is on.
    pub fn new(pattern: &str, options: &AnalysisOptions) -> Result<Self, PatternError> {
        let source = if options.regex {
            pattern.to_string()
        } else {
            regex::escape(pattern)
        };
        let regex = RegexBuilder::new(&source)
            .case_insensitive(!options.case_sensitive)
            .build()
            .map_err(|e| PatternError {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { regex })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Lines of `text` containing a match.
    pub fn matching_lines(&self, text: &str) -> Vec<String> {
        text.lines()
            .filter(|line| self.regex.is_match(line))
            .map(|line| line.trim_end().to_string())
            .collect()
    }
}

/// One event matching a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub seq: u64,
    pub ts_ns: u64,
    pub kind: EventKind,
    /// Matching lines of the event's plain text.
    pub lines: Vec<String>,
    /// Segment the event belongs to; absent in raw mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment: Option<usize>,
}

/// Events whose plain text matches, in sequence order.
///
/// Pass `segments` to attach the owning segment index to each hit.
pub fn search(events: &[Event], segments: Option<&[CommandSegment]>, matcher: &Matcher) -> Vec<SearchHit> {
    let index = segments.map(segment_index);

    events
        .par_iter()
        .filter_map(|event| {
            let text = plain_text(&event.payload);
            if !matcher.is_match(&text) {
                return None;
            }
            let mut lines = matcher.matching_lines(&text);
            if lines.is_empty() {
                // A regex spanning a line break matches the text but no single line.
                lines.push(text.trim_end().to_string());
            }
            Some(SearchHit {
                seq: event.seq,
                ts_ns: event.ts_ns,
                kind: event.kind,
                lines,
                segment: index.as_ref().and_then(|index| index.get(&event.seq).copied()),
            })
        })
        .collect()
}
