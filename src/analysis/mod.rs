//! Offline analysis of recorded sessions.
//!
//! An [`Analyzer`] parses a log once into an immutable [`SessionTrace`] and
//! answers queries against it. The trace sits behind an `Arc`, so queries can
//! run on several threads at once; [`Analyzer::summary`] does exactly that.
//!
//! # Structure
//!
//! - `search` - plain or regex search over payload text
//! - `segment` - grouping into command segments
//! - `stats` - duration, line counts, command frequency
//! - `ips` - IP address extraction
//! - `bookmark` - notes on events, stored beside the log
//! - `export` - JSON-lines export and import
//! - `screen` - clean line reconstruction of the output
//! - `text` - escape-stripped payload text

pub mod bookmark;
pub mod error;
pub mod export;
pub mod ips;
pub mod screen;
pub mod search;
pub mod segment;
pub mod stats;
pub mod text;

use std::io::Write;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

pub use bookmark::{Bookmark, BookmarkSet};
pub use error::{AnalysisError, PatternError};
pub use export::{ExportFilter, ExportRecord};
pub use screen::CleanLine;
pub use search::{Matcher, SearchHit};
pub use segment::CommandSegment;
pub use stats::{FrequencyEntry, LineCounts};

use crate::config::AnalysisConfig;
use crate::tracelog::{Event, LogParser, LostRecord, ParsedLog, SessionHeader, SessionTrailer};

/// Query options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisOptions {
    pub case_sensitive: bool,
    /// Treat search patterns as regular expressions instead of literals.
    pub regex: bool,
    /// Work on the bare event sequence, without command segments.
    pub raw: bool,
}

impl From<&AnalysisConfig> for AnalysisOptions {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            case_sensitive: config.case_sensitive,
            regex: config.regex,
            raw: config.raw,
        }
    }
}

/// A parsed session, read-only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionTrace {
    pub header: Option<SessionHeader>,
    pub trailer: Option<SessionTrailer>,
    pub events: Vec<Event>,
    /// Records lost at capture time. Their sequence numbers are missing from
    /// `events`.
    pub lost: Vec<LostRecord>,
    /// Bytes of a truncated final record dropped by the parser.
    pub discarded_bytes: u64,
}

impl SessionTrace {
    pub fn from_events(events: Vec<Event>) -> Self {
        Self {
            events,
            ..Self::default()
        }
    }

    /// Event with sequence number `seq`.
    pub fn event(&self, seq: u64) -> Option<&Event> {
        // Parsed logs are gapless from 0, so try the direct index first.
        usize::try_from(seq)
            .ok()
            .and_then(|i| self.events.get(i))
            .filter(|e| e.seq == seq)
            .or_else(|| self.events.iter().find(|e| e.seq == seq))
    }
}

impl From<ParsedLog> for SessionTrace {
    fn from(log: ParsedLog) -> Self {
        Self {
            header: log.header,
            trailer: log.trailer,
            events: log.events,
            lost: log.lost,
            discarded_bytes: log.discarded_bytes,
        }
    }
}

/// Everything `ktrace stats` shows, computed in parallel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceSummary {
    pub duration_ns: u64,
    pub counts: LineCounts,
    pub segments: usize,
    pub top_commands: Vec<FrequencyEntry>,
    pub ips: Vec<IpAddr>,
    pub lost_events: u64,
    pub discarded_bytes: u64,
}

/// Query engine over one session.
#[derive(Debug, Clone)]
pub struct Analyzer {
    trace: Arc<SessionTrace>,
    options: AnalysisOptions,
}

impl Analyzer {
    pub fn new(trace: SessionTrace, options: AnalysisOptions) -> Self {
        Self {
            trace: Arc::new(trace),
            options,
        }
    }

    /// Parse the log at `path`.
    pub fn open<P: AsRef<Path>>(path: P, options: AnalysisOptions) -> Result<Self, AnalysisError> {
        let log = LogParser::new(path.as_ref()).parse()?;
        debug!(
            path = %path.as_ref().display(),
            events = log.events.len(),
            discarded = log.discarded_bytes,
            "trace loaded"
        );
        Ok(Self::new(log.into(), options))
    }

    pub fn trace(&self) -> &Arc<SessionTrace> {
        &self.trace
    }

    pub fn events(&self) -> &[Event] {
        &self.trace.events
    }

    pub fn options(&self) -> AnalysisOptions {
        self.options
    }

    /// Same trace, different options.
    pub fn with_options(&self, options: AnalysisOptions) -> Self {
        Self {
            trace: self.trace.clone(),
            options,
        }
    }

    /// Events matching `pattern`, in sequence order. Outside raw mode each
    /// hit carries the index of its command segment.
    pub fn search(&self, pattern: &str) -> Result<Vec<SearchHit>, PatternError> {
        let matcher = Matcher::new(pattern, &self.options)?;
        let segments = (!self.options.raw).then(|| self.segments());
        Ok(search::search(self.events(), segments.as_deref(), &matcher))
    }

    pub fn segments(&self) -> Vec<CommandSegment> {
        segment::segment(self.events())
    }

    pub fn duration_ns(&self) -> u64 {
        stats::duration_ns(self.events())
    }

    pub fn line_counts(&self) -> LineCounts {
        stats::line_counts(self.events())
    }

    pub fn frequency(&self, top_n: usize) -> Vec<FrequencyEntry> {
        stats::frequency(self.events(), top_n)
    }

    pub fn ips(&self) -> Vec<IpAddr> {
        ips::extract_ips(self.events())
    }

    pub fn clean_lines(&self) -> Vec<CleanLine> {
        screen::clean_lines(self.events())
    }

    /// Export the events selected by `filter` as JSON lines.
    pub fn export<W: Write>(
        &self,
        out: W,
        filter: &ExportFilter,
        bookmarks: Option<&BookmarkSet>,
    ) -> Result<u64, AnalysisError> {
        Ok(export::export_events(self.events(), out, filter, bookmarks)?)
    }

    pub fn summary(&self, top_n: usize) -> TraceSummary {
        let ((duration_ns, counts), ((top_commands, ips), segments)) = rayon::join(
            || (self.duration_ns(), self.line_counts()),
            || rayon::join(|| (self.frequency(top_n), self.ips()), || self.segments().len()),
        );
        TraceSummary {
            duration_ns,
            counts,
            segments,
            top_commands,
            ips,
            lost_events: self.trace.lost.len() as u64,
            discarded_bytes: self.trace.discarded_bytes,
        }
    }
}
