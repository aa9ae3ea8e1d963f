//! Session log parser.
//!
//! Parsing is lazy: [`LogParser::records`] returns an iterator that reads one
//! line ahead of the record it yields, which is how it tells a damaged final
//! line (truncation, recovered) from a damaged line in the middle of the file
//! (corruption, reported).
//!
//! # Error Handling
//!
//! - A final line without a newline is discarded and its bytes counted.
//! - A final newline-terminated line that does not parse is discarded too.
//!   Trailing blank lines do not change which line counts as final.
//! - A `loss` line stands in for the record with its sequence number; it is
//!   collected in [`ParseReport::lost`] rather than yielded.
//! - Anything inconsistent before the last line yields [`CorruptLogError`]
//!   with the 1-based line number and byte offset, after which the iterator
//!   is exhausted.
//!
//! # Example
//!
//! ```no_run
//! use ktrace::tracelog::LogParser;
//!
//! let parser = LogParser::new("session.ktr");
//! let mut records = parser.records()?;
//! for event in records.by_ref() {
//!     let event = event?;
//!     println!("{} {} {} bytes", event.seq, event.kind, event.payload.len());
//! }
//! println!("discarded {} bytes", records.report().discarded_bytes);
//! # Ok::<(), ktrace::tracelog::LogError>(())
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, warn};

use super::error::{CorruptLogError, LogError};
use super::types::{Event, EventKind, LostRecord, MetaLine, SessionHeader, SessionTrailer};

impl Event {
    /// Parse one record line (without its trailing newline).
    pub fn from_line(line: &str) -> Result<Self, String> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 4 {
            return Err(format!("expected 4 tab-separated fields, found {}", fields.len()));
        }

        let seq = fields[0]
            .parse::<u64>()
            .map_err(|_| format!("invalid sequence number {:?}", fields[0]))?;
        let ts_ns = fields[1]
            .parse::<u64>()
            .map_err(|_| format!("invalid timestamp {:?}", fields[1]))?;
        let kind = EventKind::from_code(fields[2])
            .ok_or_else(|| format!("unknown event kind {:?}", fields[2]))?;
        let payload = STANDARD
            .decode(fields[3])
            .map_err(|e| format!("invalid payload encoding: {}", e))?;

        Ok(Event {
            seq,
            ts_ns,
            kind,
            payload,
        })
    }
}

/// Summary of a completed (or aborted) pass over a log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseReport {
    /// Event records yielded.
    pub records: u64,
    /// Bytes of a truncated trailing line that were dropped.
    pub discarded_bytes: u64,
    /// Records the writer failed to append, in sequence order.
    pub lost: Vec<LostRecord>,
    pub header: Option<SessionHeader>,
    pub trailer: Option<SessionTrailer>,
}

/// A fully materialised log.
#[derive(Debug, Clone, Default)]
pub struct ParsedLog {
    pub header: Option<SessionHeader>,
    pub trailer: Option<SessionTrailer>,
    pub events: Vec<Event>,
    pub lost: Vec<LostRecord>,
    pub discarded_bytes: u64,
}

/// Parser for one log file. Each call to [`records`](Self::records) reopens
/// the file, so a parser can be iterated any number of times.
#[derive(Debug, Clone)]
pub struct LogParser {
    path: PathBuf,
}

impl LogParser {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start a fresh pass over the file.
    pub fn records(&self) -> Result<Records<BufReader<File>>, LogError> {
        let file = File::open(&self.path).map_err(|source| LogError::Open {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "parsing log");
        Ok(Records::new(BufReader::new(file)))
    }

    /// Parse the whole file into memory.
    pub fn parse(&self) -> Result<ParsedLog, LogError> {
        self.records()?.collect_log()
    }
}

/// One physical line read from the log.
struct RawLine {
    bytes: Vec<u8>,
    offset: u64,
    number: usize,
    terminated: bool,
}

/// Lazy iterator over the event records of a log.
pub struct Records<R> {
    reader: R,
    lookahead: Option<RawLine>,
    primed: bool,
    next_offset: u64,
    next_number: usize,
    expected_seq: u64,
    last_ts: u64,
    seen_content: bool,
    finished: bool,
    report: ParseReport,
}

impl<R: BufRead> Records<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            lookahead: None,
            primed: false,
            next_offset: 0,
            next_number: 1,
            expected_seq: 0,
            last_ts: 0,
            seen_content: false,
            finished: false,
            report: ParseReport::default(),
        }
    }

    /// Counters and metadata gathered so far. Complete once the iterator
    /// has returned `None`.
    pub fn report(&self) -> &ParseReport {
        &self.report
    }

    /// Drain the iterator into a [`ParsedLog`].
    pub fn collect_log(mut self) -> Result<ParsedLog, LogError> {
        let mut events = Vec::new();
        for event in self.by_ref() {
            events.push(event?);
        }
        Ok(ParsedLog {
            header: self.report.header.take(),
            trailer: self.report.trailer.take(),
            events,
            lost: std::mem::take(&mut self.report.lost),
            discarded_bytes: self.report.discarded_bytes,
        })
    }

    fn read_raw(&mut self) -> Result<Option<RawLine>, LogError> {
        let mut bytes = Vec::new();
        let n = self.reader.read_until(b'\n', &mut bytes).map_err(LogError::Read)?;
        if n == 0 {
            return Ok(None);
        }
        let terminated = bytes.last() == Some(&b'\n');
        if terminated {
            bytes.pop();
        }
        let line = RawLine {
            bytes,
            offset: self.next_offset,
            number: self.next_number,
            terminated,
        };
        self.next_offset += n as u64;
        self.next_number += 1;
        Ok(Some(line))
    }

    /// Next line that is not blank. Blank lines carry nothing, so they are
    /// dropped here and never affect which line is the last.
    fn read_significant(&mut self) -> Result<Option<RawLine>, LogError> {
        loop {
            match self.read_raw()? {
                Some(line) if line.terminated && line.bytes.iter().all(u8::is_ascii_whitespace) => {
                    continue
                }
                other => return Ok(other),
            }
        }
    }

    /// Take the buffered line and refill the lookahead slot.
    /// Returns the line and whether it is the last one in the file.
    fn advance(&mut self) -> Result<Option<(RawLine, bool)>, LogError> {
        if !self.primed {
            self.lookahead = self.read_significant()?;
            self.primed = true;
        }
        let Some(current) = self.lookahead.take() else {
            return Ok(None);
        };
        self.lookahead = self.read_significant()?;
        let is_last = self.lookahead.is_none();
        Ok(Some((current, is_last)))
    }

    fn corrupt(&self, line: &RawLine, record_index: Option<u64>, reason: impl Into<String>) -> LogError {
        LogError::Corrupt(CorruptLogError {
            line: line.number,
            offset: line.offset,
            record_index,
            reason: reason.into(),
        })
    }

    fn discard(&mut self, line: &RawLine, reason: &str) {
        let len = line.bytes.len() as u64 + u64::from(line.terminated);
        warn!(line = line.number, bytes = len, reason, "discarding truncated trailing record");
        self.report.discarded_bytes += len;
    }

    fn step(&mut self) -> Result<Option<Event>, LogError> {
        loop {
            let Some((line, is_last)) = self.advance()? else {
                return Ok(None);
            };

            // read_until only stops short of a newline at EOF.
            if !line.terminated {
                self.discard(&line, "missing newline");
                return Ok(None);
            }

            let text = match std::str::from_utf8(&line.bytes) {
                Ok(text) => text,
                Err(_) if is_last => {
                    self.discard(&line, "invalid utf-8");
                    continue;
                }
                Err(_) => return Err(self.corrupt(&line, None, "line is not valid UTF-8")),
            };

            if text.trim().is_empty() {
                continue;
            }

            if text.starts_with('{') {
                match serde_json::from_str::<MetaLine>(text) {
                    Ok(MetaLine::Start(header)) if !self.seen_content => {
                        self.seen_content = true;
                        self.report.header = Some(header);
                    }
                    Ok(MetaLine::End(trailer)) if is_last => {
                        self.report.trailer = Some(trailer);
                    }
                    Ok(MetaLine::Loss(lost)) => {
                        if lost.seq != self.expected_seq {
                            return Err(self.corrupt(
                                &line,
                                Some(self.report.records),
                                format!("expected sequence {}, found loss of {}", self.expected_seq, lost.seq),
                            ));
                        }
                        debug!(seq = lost.seq, bytes = lost.bytes, "record lost at capture time");
                        self.seen_content = true;
                        self.expected_seq += 1;
                        self.report.lost.push(lost);
                    }
                    Ok(_) => return Err(self.corrupt(&line, None, "metadata line out of place")),
                    Err(_) if is_last => self.discard(&line, "malformed metadata"),
                    Err(e) => {
                        return Err(self.corrupt(&line, None, format!("malformed metadata: {}", e)))
                    }
                }
                continue;
            }

            let index = self.report.records;
            let event = match Event::from_line(text) {
                Ok(event) => event,
                Err(_) if is_last => {
                    self.discard(&line, "malformed record");
                    continue;
                }
                Err(reason) => return Err(self.corrupt(&line, Some(index), reason)),
            };

            if event.seq != self.expected_seq {
                return Err(self.corrupt(
                    &line,
                    Some(index),
                    format!("expected sequence {}, found {}", self.expected_seq, event.seq),
                ));
            }
            if event.ts_ns < self.last_ts {
                return Err(self.corrupt(
                    &line,
                    Some(index),
                    format!("timestamp {} precedes previous {}", event.ts_ns, self.last_ts),
                ));
            }

            self.seen_content = true;
            self.expected_seq += 1;
            self.last_ts = event.ts_ns;
            self.report.records += 1;
            return Ok(Some(event));
        }
    }
}

impl<R: BufRead> Iterator for Records<R> {
    type Item = Result<Event, LogError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.step() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
