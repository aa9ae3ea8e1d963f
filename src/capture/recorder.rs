//! Event recorder: turns the two relayed byte streams into sequenced events.
//!
//! Input bytes become one event per read. Output bytes are coalesced into a
//! chunk until an input event arrives, the idle gap elapses, or the chunk
//! reaches its maximum size.
//!
//! [`EventRecorder`] is the plain state machine. [`SharedRecorder`] is the
//! handle both relay directions hold: it takes the timestamp and assigns the
//! sequence number under one mutex, then forwards the events to the journal
//! channel while still holding it, so channel order is sequence order.

use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::tracelog::{Event, EventKind};

/// Output coalescing thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoalesceConfig {
    /// Flush the pending output chunk once no output arrived for this long.
    pub idle_gap: Duration,
    /// Flush the pending output chunk once it holds this many bytes.
    pub max_chunk_bytes: usize,
}

impl Default for CoalesceConfig {
    fn default() -> Self {
        Self {
            idle_gap: Duration::from_millis(crate::config::default_idle_gap_ms()),
            max_chunk_bytes: crate::config::default_max_chunk_bytes(),
        }
    }
}

/// Monotonic clock anchored at session start.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    origin: Instant,
}

impl SessionClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now_ns(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

/// Sequencing and coalescing state.
#[derive(Debug)]
pub struct EventRecorder {
    config: CoalesceConfig,
    next_seq: u64,
    last_ts: u64,
    pending: Vec<u8>,
    pending_ts: u64,
    last_output_ts: u64,
}

impl EventRecorder {
    pub fn new(config: CoalesceConfig) -> Self {
        Self {
            config,
            next_seq: 0,
            last_ts: 0,
            pending: Vec::new(),
            pending_ts: 0,
            last_output_ts: 0,
        }
    }

    pub fn config(&self) -> &CoalesceConfig {
        &self.config
    }

    /// Sequence number the next event will get.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Observe bytes crossing the proxy at `ts_ns`.
    pub fn observe(&mut self, kind: EventKind, bytes: &[u8], ts_ns: u64) -> Vec<Event> {
        let ts_ns = ts_ns.max(self.last_ts);
        let mut events = Vec::new();
        if bytes.is_empty() {
            return events;
        }

        match kind {
            EventKind::Input => {
                events.extend(self.flush_pending());
                events.push(self.emit(EventKind::Input, bytes.to_vec(), ts_ns));
            }
            EventKind::Output => {
                if self.has_pending() && self.idle_elapsed(ts_ns) {
                    events.extend(self.flush_pending());
                }
                if self.pending.is_empty() {
                    self.pending_ts = ts_ns;
                }
                self.pending.extend_from_slice(bytes);
                self.last_output_ts = ts_ns;

                let max = self.config.max_chunk_bytes.max(1);
                while self.pending.len() >= max {
                    let rest = self.pending.split_off(max);
                    let chunk = std::mem::replace(&mut self.pending, rest);
                    let chunk_ts = self.pending_ts;
                    events.push(self.emit(EventKind::Output, chunk, chunk_ts));
                    self.pending_ts = ts_ns;
                }
            }
        }
        events
    }

    /// Flush the pending chunk if the idle gap has elapsed by `now_ns`.
    pub fn poll_idle(&mut self, now_ns: u64) -> Option<Event> {
        if self.has_pending() && self.idle_elapsed(now_ns) {
            self.flush_pending()
        } else {
            None
        }
    }

    /// Flush whatever output is pending, regardless of thresholds.
    pub fn finish(&mut self) -> Option<Event> {
        self.flush_pending()
    }

    fn idle_elapsed(&self, now_ns: u64) -> bool {
        let gap = u64::try_from(self.config.idle_gap.as_nanos()).unwrap_or(u64::MAX);
        now_ns.saturating_sub(self.last_output_ts) >= gap
    }

    fn flush_pending(&mut self) -> Option<Event> {
        if self.pending.is_empty() {
            return None;
        }
        let chunk = std::mem::take(&mut self.pending);
        let ts = self.pending_ts;
        Some(self.emit(EventKind::Output, chunk, ts))
    }

    fn emit(&mut self, kind: EventKind, payload: Vec<u8>, ts_ns: u64) -> Event {
        let ts_ns = ts_ns.max(self.last_ts);
        let event = Event::new(self.next_seq, ts_ns, kind, payload);
        self.next_seq += 1;
        self.last_ts = ts_ns;
        event
    }
}

/// Message consumed by the journal thread.
#[derive(Debug)]
pub enum JournalMsg {
    Event(Event),
    /// No more events will follow.
    Shutdown,
}

/// Recorder handle shared by both relay directions and the journal.
#[derive(Clone)]
pub struct SharedRecorder {
    inner: Arc<Mutex<EventRecorder>>,
    clock: SessionClock,
    sink: Sender<JournalMsg>,
}

impl SharedRecorder {
    pub fn new(recorder: EventRecorder, clock: SessionClock, sink: Sender<JournalMsg>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(recorder)),
            clock,
            sink,
        }
    }

    pub fn clock(&self) -> SessionClock {
        self.clock
    }

    /// Record bytes observed now. Returns the number of events emitted.
    pub fn observe(&self, kind: EventKind, bytes: &[u8]) -> usize {
        let mut recorder = self.lock();
        let events = recorder.observe(kind, bytes, self.clock.now_ns());
        let count = events.len();
        for event in events {
            self.forward(event);
        }
        count
    }

    /// Flush the pending chunk if it has been idle long enough.
    pub fn poll_idle(&self) {
        let mut recorder = self.lock();
        if let Some(event) = recorder.poll_idle(self.clock.now_ns()) {
            self.forward(event);
        }
    }

    /// Flush the pending chunk and tell the journal to stop.
    pub fn finish(&self) {
        let mut recorder = self.lock();
        if let Some(event) = recorder.finish() {
            self.forward(event);
        }
        let _ = self.sink.send(JournalMsg::Shutdown);
    }

    /// Total events emitted so far.
    pub fn emitted(&self) -> u64 {
        self.lock().next_seq()
    }

    fn forward(&self, event: Event) {
        trace!(seq = event.seq, kind = %event.kind, bytes = event.payload.len(), "event");
        // The journal only disappears during teardown.
        let _ = self.sink.send(JournalMsg::Event(event));
    }

    fn lock(&self) -> MutexGuard<'_, EventRecorder> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
