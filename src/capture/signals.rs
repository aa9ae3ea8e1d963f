//! Signal and lifecycle monitoring for a capture session.
//!
//! Detects the conditions that end a session from the outside:
//! - SIGINT via ctrlc handler (raw mode turns Ctrl+C into a byte for the
//!   shell, so this only fires for signals sent by other processes)
//! - SIGTERM and SIGHUP via signal_hook
//! - Parent process death (terminal force-closed, reparented to init/subreaper)
//!
//! SIGWINCH is tracked separately and only triggers a pty resize.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

/// Watches for termination and resize signals while a session runs.
pub struct SignalWatch {
    terminate: Arc<AtomicUsize>,
    resized: Arc<AtomicBool>,
    ids: Vec<signal_hook::SigId>,
    initial_ppid: u32,
}

impl Default for SignalWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalWatch {
    /// Snapshot the current parent PID for later orphan detection.
    pub fn new() -> Self {
        Self {
            terminate: Arc::new(AtomicUsize::new(0)),
            resized: Arc::new(AtomicBool::new(false)),
            ids: Vec::new(),
            initial_ppid: unsafe { libc::getppid() as u32 },
        }
    }

    /// Install handlers for SIGINT, SIGTERM, SIGHUP and SIGWINCH.
    ///
    /// Safe to call more than once; a second ctrlc registration is ignored.
    pub fn register(&mut self) {
        let flag = self.terminate.clone();
        ctrlc::set_handler(move || {
            flag.store(libc::SIGINT as usize, Ordering::SeqCst);
        })
        .ok(); // Ignore if handler already set

        use signal_hook::flag::{register, register_usize};
        for signal in [libc::SIGTERM, libc::SIGHUP] {
            if let Ok(id) = register_usize(signal, self.terminate.clone(), signal as usize) {
                self.ids.push(id);
            }
        }
        if let Ok(id) = register(libc::SIGWINCH, self.resized.clone()) {
            self.ids.push(id);
        }
        debug!(handlers = self.ids.len(), "signal handlers registered");
    }

    /// The signal that asked the session to end, if any.
    pub fn pending_signal(&self) -> Option<i32> {
        match self.terminate.load(Ordering::SeqCst) {
            0 => None,
            signal => Some(signal as i32),
        }
    }

    /// Whether a resize arrived since the last call.
    pub fn take_resize(&self) -> bool {
        self.resized.swap(false, Ordering::SeqCst)
    }

    /// Any termination condition: a signal or parent death.
    pub fn should_terminate(&self) -> bool {
        self.pending_signal().is_some() || self.is_orphaned()
    }

    /// Detect parent death by comparing current ppid against the initial snapshot.
    ///
    /// Works on both macOS (reparented to launchd/PID 1) and Linux (reparented to
    /// a systemd subreaper or PID 1). Any ppid change means the parent died.
    pub fn is_orphaned(&self) -> bool {
        let current_ppid = unsafe { libc::getppid() as u32 };
        current_ppid != self.initial_ppid
    }

    #[cfg(test)]
    pub(crate) fn raise_for_test(&self, signal: i32) {
        self.terminate.store(signal as usize, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub(crate) fn resize_for_test(&self) {
        self.resized.store(true, Ordering::SeqCst);
    }
}

impl Drop for SignalWatch {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}

/// Re-deliver `signal` with its default disposition.
///
/// Called after the log is closed and the terminal restored, so the process
/// ends the way the signal's sender expected.
pub fn reraise(signal: i32) {
    debug!(signal, "re-raising signal with default action");
    unsafe {
        libc::signal(signal, libc::SIG_DFL);
        libc::raise(signal);
    }
}

/// Human-readable signal name for messages.
pub fn signal_name(signal: i32) -> &'static str {
    match signal {
        libc::SIGINT => "SIGINT",
        libc::SIGTERM => "SIGTERM",
        libc::SIGHUP => "SIGHUP",
        libc::SIGKILL => "SIGKILL",
        _ => "signal",
    }
}
