//! Session proxy: runs the shell on a pseudo-terminal and relays both
//! directions between it and the real terminal while recording.
//!
//! Thread layout for one session:
//!
//! ```text
//! terminal input --[input relay]--> pty master --> shell
//! terminal output <--[output relay]-- pty master <-- shell
//!          both relays --SharedRecorder--> channel --> [journal] --> .ktr
//! ```
//!
//! The caller's thread sits in [`RunningSession::wait`], watching for shell
//! exit, a close request, signals and resizes.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use super::error::{SpawnError, WriteError};
use super::journal::{spawn_journal, CaptureHealth, JournalOutcome, LossMarker};
use super::pty::{self, Pty, PtySize};
use super::recorder::{CoalesceConfig, EventRecorder, SessionClock, SharedRecorder};
use super::signals::SignalWatch;
use super::terminal;
use crate::config::CaptureConfig;
use crate::tracelog::{EventKind, LogWriter, SessionHeader, SessionTrailer};

/// How long a relay waits on its source before re-checking for shutdown.
const RELAY_POLL: Duration = Duration::from_millis(100);

/// Tick of the wait loop (shell exit, close request, signals, resize).
const WAIT_TICK: Duration = Duration::from_millis(20);

/// Tunables for one capture session.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub coalesce: CoalesceConfig,
    /// How often the journal checks for an idle output chunk.
    pub flush_interval: Duration,
    /// Time a hung shell gets after SIGHUP before SIGKILL. Also bounds how
    /// long output is drained once the session is closing.
    pub grace_period: Duration,
    pub input_buffer_bytes: usize,
    pub output_buffer_bytes: usize,
    /// Extra arguments passed to the shell.
    pub shell_args: Vec<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

impl From<&CaptureConfig> for ProxyConfig {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            coalesce: CoalesceConfig {
                idle_gap: Duration::from_millis(config.idle_gap_ms),
                max_chunk_bytes: config.max_chunk_bytes,
            },
            flush_interval: Duration::from_millis(config.flush_interval_ms),
            grace_period: Duration::from_millis(config.grace_period_ms),
            input_buffer_bytes: config.input_buffer_bytes.max(1),
            output_buffer_bytes: config.output_buffer_bytes.max(1),
            shell_args: Vec::new(),
        }
    }
}

/// The real terminal as seen by the relays.
pub struct TerminalEndpoints {
    /// Source of user keystrokes. Must be pollable (tty, pipe).
    pub input: File,
    /// Where shell output is shown.
    pub output: Box<dyn Write + Send>,
}

impl TerminalEndpoints {
    /// The process's own stdin and stdout.
    pub fn stdio() -> io::Result<Self> {
        let fd = unsafe { libc::dup(libc::STDIN_FILENO) };
        if fd == -1 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: dup returned a fresh descriptor we now own.
        let input = unsafe { File::from_raw_fd(fd) };
        Ok(Self {
            input,
            output: Box::new(io::stdout()),
        })
    }
}

/// Starts capture sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionProxy {
    config: ProxyConfig,
}

impl SessionProxy {
    pub fn new(config: ProxyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Open the log, spawn `shell` on a new pty of `size` and start relaying.
    ///
    /// If the shell cannot be started the freshly created log is removed.
    pub fn start(
        &self,
        shell: &str,
        size: PtySize,
        log_path: &Path,
        endpoints: TerminalEndpoints,
    ) -> Result<RunningSession, SpawnError> {
        let started_at = Local::now();
        let header = SessionHeader::new(shell, started_at, Some((size.cols, size.rows)));
        let writer = LogWriter::create(log_path, Some(&header)).map_err(|source| SpawnError::Log {
            path: log_path.to_path_buf(),
            source,
        })?;

        let spawned = Pty::open(size)
            .map_err(SpawnError::OpenPty)
            .and_then(|pty| {
                pty.spawn(shell, &self.config.shell_args)
                    .map_err(|source| SpawnError::Shell {
                        shell: shell.to_string(),
                        source,
                    })
            });
        let (master, child) = match spawned {
            Ok(pair) => pair,
            Err(e) => {
                drop(writer);
                let _ = std::fs::remove_file(log_path);
                return Err(e);
            }
        };
        info!(shell, pid = child.id(), log = %log_path.display(), "session started");

        let clock = SessionClock::start();
        let (tx, rx) = mpsc::channel();
        let recorder = SharedRecorder::new(EventRecorder::new(self.config.coalesce), clock, tx);
        let health = Arc::new(CaptureHealth::default());
        let relay_stop = Arc::new(AtomicBool::new(false));

        // From here on a failure must not leave the shell running.
        let threads = self.spawn_threads(&master, endpoints, writer, rx, &recorder, &health, &relay_stop);
        let (journal, input_relay, output_relay) = match threads {
            Ok(handles) => handles,
            Err(e) => {
                relay_stop.store(true, Ordering::SeqCst);
                recorder.finish();
                let mut child = child;
                let _ = child.kill();
                let _ = child.wait();
                return Err(SpawnError::Relay(e));
            }
        };

        Ok(RunningSession {
            log_path: log_path.to_path_buf(),
            started_at,
            clock,
            child,
            master,
            recorder,
            health,
            relay_stop,
            close_requested: Arc::new(AtomicBool::new(false)),
            journal,
            input_relay,
            output_relay,
            grace_period: self.config.grace_period,
            signals: None,
        })
    }

    #[allow(clippy::too_many_arguments, clippy::type_complexity)]
    fn spawn_threads(
        &self,
        master: &File,
        endpoints: TerminalEndpoints,
        writer: LogWriter,
        rx: mpsc::Receiver<super::recorder::JournalMsg>,
        recorder: &SharedRecorder,
        health: &Arc<CaptureHealth>,
        relay_stop: &Arc<AtomicBool>,
    ) -> io::Result<(JoinHandle<JournalOutcome<LogWriter>>, JoinHandle<u64>, JoinHandle<u64>)> {
        let journal = spawn_journal(
            writer,
            rx,
            recorder.clone(),
            health.clone(),
            self.config.flush_interval,
        )?;

        let input_relay = {
            let to_shell = master.try_clone()?;
            let recorder = recorder.clone();
            let stop = relay_stop.clone();
            let size = self.config.input_buffer_bytes;
            let input = endpoints.input;
            thread::Builder::new()
                .name("ktrace-input".to_string())
                .spawn(move || relay_input(input, to_shell, recorder, stop, size))?
        };

        let output_relay = {
            let from_shell = master.try_clone()?;
            let recorder = recorder.clone();
            let stop = relay_stop.clone();
            let size = self.config.output_buffer_bytes;
            let drain_limit = self.config.grace_period;
            let output = endpoints.output;
            thread::Builder::new()
                .name("ktrace-output".to_string())
                .spawn(move || relay_output(from_shell, output, recorder, stop, size, drain_limit))?
        };

        Ok((journal, input_relay, output_relay))
    }
}

/// Asks a running session to end. Cheap to clone, usable from any thread.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    requested: Arc<AtomicBool>,
}

impl CloseHandle {
    pub fn close(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }
}

/// Outcome of a finished session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub log_path: PathBuf,
    pub started_at: DateTime<Local>,
    pub ended_at: DateTime<Local>,
    pub duration: Duration,
    pub events: u64,
    pub losses: Vec<LossMarker>,
    /// Shell exit status; `None` when it was killed by a signal.
    pub exit_code: Option<i32>,
    /// Signal received by ktrace that ended the session.
    pub signal: Option<i32>,
}

impl SessionSummary {
    pub fn is_degraded(&self) -> bool {
        !self.losses.is_empty()
    }
}

/// A live capture session.
pub struct RunningSession {
    log_path: PathBuf,
    started_at: DateTime<Local>,
    clock: SessionClock,
    child: Child,
    master: File,
    recorder: SharedRecorder,
    health: Arc<CaptureHealth>,
    relay_stop: Arc<AtomicBool>,
    close_requested: Arc<AtomicBool>,
    journal: JoinHandle<JournalOutcome<LogWriter>>,
    input_relay: JoinHandle<u64>,
    output_relay: JoinHandle<u64>,
    grace_period: Duration,
    signals: Option<SignalWatch>,
}

impl RunningSession {
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            requested: self.close_requested.clone(),
        }
    }

    /// Watch `signals` while waiting: termination signals end the session and
    /// SIGWINCH resizes the pty to the real terminal's size.
    pub fn with_signals(mut self, signals: SignalWatch) -> Self {
        self.signals = Some(signals);
        self
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Block until the session ends, then tear it down and close the log.
    pub fn wait(mut self) -> Result<SessionSummary, WriteError> {
        let (status, signal) = self.watch();
        let exit_code = match status {
            Some(status) => status.code(),
            None => self.terminate_shell(),
        };

        self.relay_stop.store(true, Ordering::SeqCst);
        let output_bytes = self.output_relay.join().unwrap_or_else(|_| {
            warn!("output relay panicked");
            0
        });
        let input_bytes = self.input_relay.join().unwrap_or_else(|_| {
            warn!("input relay panicked");
            0
        });
        debug!(input_bytes, output_bytes, "relays stopped");

        self.recorder.finish();
        let JournalOutcome { mut writer, written } = self.journal.join().map_err(|_| {
            WriteError::new(
                "session trailer",
                io::Error::new(io::ErrorKind::Other, "journal thread panicked"),
            )
        })?;

        let losses = self.health.losses();
        let ended_at = Local::now();
        let duration_ns = self.clock.now_ns();
        let trailer = SessionTrailer {
            ended_at,
            duration_ns,
            events: written,
            lost_events: losses.len() as u64,
            exit_code,
        };
        writer.close(Some(&trailer))?;
        info!(events = written, lost = losses.len(), ?exit_code, "session closed");

        Ok(SessionSummary {
            log_path: self.log_path,
            started_at: self.started_at,
            ended_at,
            duration: Duration::from_nanos(duration_ns),
            events: written,
            losses,
            exit_code,
            signal,
        })
    }

    /// Wait loop. Returns the shell's status if it exited on its own and the
    /// signal that interrupted the session, if any.
    fn watch(&mut self) -> (Option<ExitStatus>, Option<i32>) {
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    debug!(?status, "shell exited");
                    return (Some(status), None);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "failed to poll shell status");
                    return (None, None);
                }
            }

            if self.close_requested.load(Ordering::SeqCst) {
                debug!("close requested");
                return (None, None);
            }

            if let Some(signals) = &self.signals {
                if let Some(sig) = signals.pending_signal() {
                    info!(signal = sig, "terminating on signal");
                    return (None, Some(sig));
                }
                if signals.is_orphaned() {
                    info!("parent process gone, closing session");
                    return (None, None);
                }
                if signals.take_resize() {
                    self.apply_terminal_size();
                }
            }

            thread::sleep(WAIT_TICK);
        }
    }

    fn apply_terminal_size(&self) {
        if let Some(size) = terminal::inherited_size() {
            match pty::resize(self.master.as_raw_fd(), size) {
                Ok(()) => debug!(cols = size.cols, rows = size.rows, "pty resized"),
                Err(e) => warn!(error = %e, "failed to resize pty"),
            }
        }
    }

    /// SIGHUP the shell, give it the grace period, then SIGKILL.
    fn terminate_shell(&mut self) -> Option<i32> {
        let pid = self.child.id() as libc::pid_t;
        unsafe {
            libc::kill(pid, libc::SIGHUP);
        }

        let deadline = Instant::now() + self.grace_period;
        while Instant::now() < deadline {
            match self.child.try_wait() {
                Ok(Some(status)) => return status.code(),
                Ok(None) => thread::sleep(WAIT_TICK),
                Err(_) => break,
            }
        }

        warn!(pid, grace_ms = self.grace_period.as_millis() as u64, "shell did not exit, killing");
        let _ = self.child.kill();
        self.child.wait().ok().and_then(|status| status.code())
    }
}

/// Terminal input to the shell. One input event per read.
fn relay_input(
    mut input: File,
    mut to_shell: File,
    recorder: SharedRecorder,
    stop: Arc<AtomicBool>,
    buffer_bytes: usize,
) -> u64 {
    let fd = input.as_raw_fd();
    let mut buf = vec![0u8; buffer_bytes];
    let mut total = 0u64;

    while !stop.load(Ordering::SeqCst) {
        if !ready(fd, "input") {
            continue;
        }
        let n = match input.read(&mut buf) {
            Ok(0) => {
                debug!("terminal input closed");
                break;
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(error = %e, "terminal input read failed");
                break;
            }
        };

        recorder.observe(EventKind::Input, &buf[..n]);
        total += n as u64;
        if let Err(e) = to_shell.write_all(&buf[..n]) {
            debug!(error = %e, "shell no longer accepts input");
            break;
        }
    }
    total
}

/// Shell output to the terminal. Drains until the pty hangs up. Once
/// shutdown is requested it stops when the master stays quiet for one poll
/// interval, or after `drain_limit` if something still holds the pty open
/// and keeps writing.
fn relay_output(
    mut from_shell: File,
    mut output: Box<dyn Write + Send>,
    recorder: SharedRecorder,
    stop: Arc<AtomicBool>,
    buffer_bytes: usize,
    drain_limit: Duration,
) -> u64 {
    let fd = from_shell.as_raw_fd();
    let mut buf = vec![0u8; buffer_bytes];
    let mut total = 0u64;
    let mut terminal_ok = true;
    let mut drain_deadline: Option<Instant> = None;

    loop {
        if stop.load(Ordering::SeqCst) {
            let deadline = *drain_deadline.get_or_insert_with(|| Instant::now() + drain_limit);
            if Instant::now() >= deadline {
                warn!(
                    limit_ms = drain_limit.as_millis() as u64,
                    "pty still producing output after shutdown, stopping relay"
                );
                break;
            }
        }
        if !ready(fd, "output") {
            if stop.load(Ordering::SeqCst) {
                break;
            }
            continue;
        }
        let n = match from_shell.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            // EIO once every slave descriptor is closed.
            Err(_) => break,
        };

        recorder.observe(EventKind::Output, &buf[..n]);
        total += n as u64;
        if terminal_ok {
            if let Err(e) = output.write_all(&buf[..n]).and_then(|()| output.flush()) {
                // Keep draining so the shell never blocks on a full pty.
                warn!(error = %e, "terminal output write failed");
                terminal_ok = false;
            }
        }
    }
    total
}

fn ready(fd: RawFd, direction: &str) -> bool {
    match pty::poll_readable(fd, RELAY_POLL) {
        Ok(ready) => ready,
        Err(e) => {
            warn!(direction, error = %e, "poll failed");
            thread::sleep(RELAY_POLL);
            false
        }
    }
}
