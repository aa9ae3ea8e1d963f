//! Whole-file integrity diagnosis.
//!
//! Unlike the parser, which stops at the first problem, [`diagnose`] always
//! returns a report: how many records are usable, how many trailing bytes a
//! crash left behind, and where corruption (if any) begins.

use std::path::Path;

use super::error::{CorruptLogError, LogError};
use super::reader::LogParser;

/// Result of diagnosing a session log.
#[derive(Debug, Clone, Default)]
pub struct Diagnosis {
    /// Records readable before EOF or the first corruption.
    pub records: u64,
    /// Bytes of a truncated trailing record.
    pub discarded_bytes: u64,
    /// Records the writer could not append during capture.
    pub lost_records: u64,
    pub has_header: bool,
    /// A trailer is only present when the session closed cleanly.
    pub has_trailer: bool,
    pub corruption: Option<CorruptLogError>,
}

impl Diagnosis {
    /// No corruption and no trailing fragment.
    pub fn is_clean(&self) -> bool {
        self.corruption.is_none() && self.discarded_bytes == 0
    }

    pub fn summary(&self) -> String {
        let mut summary = format!("{} records", self.records);
        if self.lost_records > 0 {
            summary.push_str(&format!(", {} lost during capture", self.lost_records));
        }
        if !self.has_header {
            summary.push_str(", no header");
        }
        if self.has_trailer {
            summary.push_str(", closed cleanly");
        } else {
            summary.push_str(", no trailer (session did not close cleanly)");
        }
        if self.discarded_bytes > 0 {
            summary.push_str(&format!(
                "\n   Truncated: {} trailing bytes discarded",
                self.discarded_bytes
            ));
        }
        if let Some(corruption) = &self.corruption {
            summary.push_str(&format!("\n   Corrupt: {}", corruption));
        }
        summary
    }
}

/// Scan a log file and report on its condition.
///
/// Only failure to open or read the file is an error; corruption is part of
/// the returned [`Diagnosis`].
pub fn diagnose<P: AsRef<Path>>(path: P) -> Result<Diagnosis, LogError> {
    let mut records = LogParser::new(path).records()?;
    let mut corruption = None;

    for event in records.by_ref() {
        match event {
            Ok(_) => {}
            Err(LogError::Corrupt(c)) => corruption = Some(c),
            Err(e) => return Err(e),
        }
    }

    let report = records.report();
    Ok(Diagnosis {
        records: report.records,
        discarded_bytes: report.discarded_bytes,
        lost_records: report.lost.len() as u64,
        has_header: report.header.is_some(),
        has_trailer: report.trailer.is_some(),
        corruption,
    })
}
