//! Append-only session log writer.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, warn};

use super::error::WriteError;
use super::types::{Event, LostRecord, MetaLine, SessionHeader, SessionTrailer};

impl Event {
    /// Serialize to one record line, including the trailing newline.
    pub fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\n",
            self.seq,
            self.ts_ns,
            self.kind.to_code(),
            STANDARD.encode(&self.payload)
        )
    }
}

impl MetaLine {
    pub fn to_line(&self) -> String {
        // Serializing these plain structs cannot fail.
        let json = serde_json::to_string(self).unwrap_or_default();
        format!("{}\n", json)
    }
}

/// Sole owner of a session's log file handle.
///
/// Every record is written with a single `write_all` of its complete line.
/// A failed write rolls the file back to the last complete record, so a
/// partial line never sits in front of later records.
pub struct LogWriter {
    file: File,
    path: PathBuf,
    /// File length up to and including the last complete line.
    committed_len: u64,
    records: u64,
    closed: bool,
}

impl LogWriter {
    /// Open `path` for appending, writing `header` first when given.
    pub fn create<P: AsRef<Path>>(path: P, header: Option<&SessionHeader>) -> Result<Self, WriteError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| WriteError::new(format!("log file {:?}", path), e))?;
        let committed_len = file.metadata().map(|m| m.len()).unwrap_or(0);

        let mut writer = Self {
            file,
            path,
            committed_len,
            records: 0,
            closed: false,
        };

        if let Some(header) = header {
            writer.write_line(&MetaLine::Start(header.clone()).to_line(), "header")?;
        }
        debug!(path = %writer.path.display(), "log writer opened");
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of event records appended by this writer.
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Append one event record.
    pub fn append(&mut self, event: &Event) -> Result<(), WriteError> {
        if self.closed {
            return Err(WriteError::new(
                format!("record {}", event.seq),
                std::io::Error::new(std::io::ErrorKind::Other, "log writer is closed"),
            ));
        }
        self.write_line(&event.to_line(), &format!("record {}", event.seq))?;
        self.records += 1;
        Ok(())
    }

    /// Record that event `lost.seq` was never written. Does not count as a
    /// record.
    pub fn append_loss(&mut self, lost: &LostRecord) -> Result<(), WriteError> {
        if self.closed {
            return Err(WriteError::new(
                format!("loss marker {}", lost.seq),
                std::io::Error::new(std::io::ErrorKind::Other, "log writer is closed"),
            ));
        }
        self.write_line(&MetaLine::Loss(lost.clone()).to_line(), &format!("loss marker {}", lost.seq))
    }

    /// Write the trailer (when given), then flush and fsync.
    ///
    /// Idempotent: closing an already closed writer is a no-op.
    pub fn close(&mut self, trailer: Option<&SessionTrailer>) -> Result<(), WriteError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let trailer_result = match trailer {
            Some(trailer) => self.write_line(&MetaLine::End(trailer.clone()).to_line(), "trailer"),
            None => Ok(()),
        };
        let sync_result = self
            .file
            .flush()
            .and_then(|_| self.file.sync_all())
            .map_err(|e| WriteError::new("fsync", e));

        debug!(path = %self.path.display(), records = self.records, "log writer closed");
        trailer_result.and(sync_result)
    }

    fn write_line(&mut self, line: &str, what: &str) -> Result<(), WriteError> {
        match self.file.write_all(line.as_bytes()) {
            Ok(()) => {
                self.committed_len += line.len() as u64;
                Ok(())
            }
            Err(e) => {
                self.rollback();
                Err(WriteError::new(what, e))
            }
        }
    }

    /// Drop any partially written line.
    fn rollback(&mut self) {
        let result = self
            .file
            .set_len(self.committed_len)
            .and_then(|_| self.file.seek(SeekFrom::End(0)).map(|_| ()));
        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "could not roll back partial record");
        }
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close(None) {
                warn!(error = %e, "log writer close on drop failed");
            }
        }
    }
}
