//! The real terminal: raw mode and size.

use std::io;

use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing::{debug, warn};

use super::pty::PtySize;

/// Puts the controlling terminal into raw mode for as long as it lives.
///
/// Dropping the guard restores the previous mode, including on error and
/// unwind paths out of the relay.
pub struct RawModeGuard {
    active: bool,
}

impl RawModeGuard {
    /// Enter raw mode if stdin is a terminal; otherwise a no-op guard.
    pub fn enter() -> io::Result<Self> {
        if !stdin_is_tty() {
            debug!("stdin is not a terminal, leaving mode unchanged");
            return Ok(Self { active: false });
        }
        enable_raw_mode()?;
        Ok(Self { active: true })
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Leave raw mode now. Safe to call more than once.
    pub fn restore(&mut self) {
        if self.active {
            if let Err(e) = disable_raw_mode() {
                warn!(error = %e, "failed to restore terminal mode");
            }
            self.active = false;
        }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

pub fn stdin_is_tty() -> bool {
    atty::is(atty::Stream::Stdin)
}

pub fn stdout_is_tty() -> bool {
    atty::is(atty::Stream::Stdout)
}

/// Size of the terminal ktrace runs in, if it has one.
pub fn inherited_size() -> Option<PtySize> {
    terminal_size::terminal_size().map(|(terminal_size::Width(cols), terminal_size::Height(rows))| {
        PtySize { cols, rows }
    })
}
