//! Journal thread: the single consumer that appends events to the log.
//!
//! The relay directions never touch the log file. They hand events to the
//! journal over a channel; the journal owns the sink and is the only caller
//! of `append`. Between messages it wakes on a short interval to flush idle
//! output chunks.
//!
//! An event whose append fails keeps its sequence number. The journal writes
//! a loss line in its place before the next record, so the log stays
//! parseable and the gap is explained.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use super::recorder::{JournalMsg, SharedRecorder};
use crate::tracelog::{Event, LogWriter, LostRecord, WriteError};

/// Destination of the journal's records.
pub trait RecordSink: Send + 'static {
    fn append(&mut self, event: &Event) -> Result<(), WriteError>;
    fn append_loss(&mut self, lost: &LostRecord) -> Result<(), WriteError>;
}

impl RecordSink for LogWriter {
    fn append(&mut self, event: &Event) -> Result<(), WriteError> {
        LogWriter::append(self, event)
    }

    fn append_loss(&mut self, lost: &LostRecord) -> Result<(), WriteError> {
        LogWriter::append_loss(self, lost)
    }
}

/// In-memory record of an event that could not be written, payload included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LossMarker {
    pub event: Event,
    pub error: String,
}

impl std::fmt::Display for LossMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "event {} ({}, {} bytes) not written: {}",
            self.event.seq,
            self.event.kind,
            self.event.payload.len(),
            self.error
        )
    }
}

/// Capture health shared between the journal and the proxy.
#[derive(Debug, Default)]
pub struct CaptureHealth {
    degraded: AtomicBool,
    losses: Mutex<Vec<LossMarker>>,
}

impl CaptureHealth {
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub fn losses(&self) -> Vec<LossMarker> {
        self.losses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn record_loss(&self, event: Event, error: String) {
        self.degraded.store(true, Ordering::SeqCst);
        self.losses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(LossMarker { event, error });
    }
}

/// What the journal hands back when it stops.
pub struct JournalOutcome<S> {
    pub writer: S,
    pub written: u64,
}

struct Journal<S> {
    sink: S,
    health: Arc<CaptureHealth>,
    /// Loss lines not yet in the log. Written before the next record.
    pending: Vec<LostRecord>,
    written: u64,
}

impl<S: RecordSink> Journal<S> {
    fn write(&mut self, event: Event) {
        match self.write_pending().and_then(|()| self.sink.append(&event)) {
            Ok(()) => self.written += 1,
            Err(e) => {
                warn!(seq = event.seq, error = %e, "capture degraded: event not written");
                self.pending.push(LostRecord::from(&event));
                self.health.record_loss(event, e.to_string());
            }
        }
    }

    fn write_pending(&mut self) -> Result<(), WriteError> {
        while let Some(lost) = self.pending.first() {
            self.sink.append_loss(lost)?;
            self.pending.remove(0);
        }
        Ok(())
    }

    fn finish(mut self) -> JournalOutcome<S> {
        if let Err(e) = self.write_pending() {
            warn!(unwritten = self.pending.len(), error = %e, "loss markers not written");
        }
        debug!(written = self.written, "journal stopped");
        JournalOutcome {
            writer: self.sink,
            written: self.written,
        }
    }
}

/// Start the journal thread.
pub fn spawn_journal<S: RecordSink>(
    sink: S,
    rx: Receiver<JournalMsg>,
    recorder: SharedRecorder,
    health: Arc<CaptureHealth>,
    flush_interval: Duration,
) -> std::io::Result<JoinHandle<JournalOutcome<S>>> {
    thread::Builder::new()
        .name("ktrace-journal".to_string())
        .spawn(move || {
            let mut journal = Journal {
                sink,
                health,
                pending: Vec::new(),
                written: 0,
            };
            loop {
                match rx.recv_timeout(flush_interval) {
                    Ok(JournalMsg::Event(event)) => journal.write(event),
                    Ok(JournalMsg::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => recorder.poll_idle(),
                }
            }
            journal.finish()
        })
}
