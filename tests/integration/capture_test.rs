//! Capture sessions against a real /bin/sh, analysed afterwards
//!
//! Skipped where no pseudo-terminal can be allocated (some CI sandboxes).

use std::fs::File;
use std::io::{self, Write};
use std::os::unix::io::FromRawFd;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ktrace::analysis::{AnalysisOptions, Analyzer};
use ktrace::capture::pty::{Pty, PtySize};
use ktrace::capture::{ProxyConfig, SessionProxy, TerminalEndpoints};
use ktrace::config::CaptureConfig;
use tempfile::TempDir;

#[derive(Clone, Default)]
struct Screen(Arc<Mutex<Vec<u8>>>);

impl Write for Screen {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn pipe() -> (File, File) {
    let mut fds = [0 as libc::c_int; 2];
    assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
    unsafe { (File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])) }
}

fn pty_available() -> bool {
    Pty::open(PtySize::default()).is_ok()
}

/// Run `script` through /bin/sh under capture and return the log's analyzer.
fn capture(config: ProxyConfig, script: &[u8]) -> (TempDir, Analyzer, Vec<u8>) {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("capture.ktr");
    let (input, mut keyboard) = pipe();
    let screen = Screen::default();

    let session = SessionProxy::new(config)
        .start(
            "/bin/sh",
            PtySize::default(),
            &log,
            TerminalEndpoints {
                input,
                output: Box::new(screen.clone()),
            },
        )
        .unwrap();
    keyboard.write_all(script).unwrap();
    let summary = session.wait().unwrap();
    assert!(!summary.is_degraded());

    let analyzer = Analyzer::open(&log, AnalysisOptions::default()).unwrap();
    let shown = screen.0.lock().unwrap().clone();
    (dir, analyzer, shown)
}

fn quick_config() -> ProxyConfig {
    ProxyConfig {
        grace_period: Duration::from_millis(500),
        ..ProxyConfig::default()
    }
}

#[test]
fn captured_session_is_searchable() {
    if !pty_available() {
        return;
    }
    let (_dir, analyzer, _) = capture(quick_config(), b"echo marker-$((6*7))\nexit\n");

    let hits = analyzer.search("marker-42").unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.kind == ktrace::EventKind::Output));

    let trailer = analyzer.trace().trailer.as_ref().unwrap();
    assert_eq!(trailer.exit_code, Some(0));
    assert_eq!(trailer.events, analyzer.events().len() as u64);
}

#[test]
fn output_chunks_respect_max_chunk_bytes() {
    if !pty_available() {
        return;
    }
    let capture_config = CaptureConfig {
        max_chunk_bytes: 16,
        ..CaptureConfig::default()
    };
    let config = ProxyConfig {
        grace_period: Duration::from_millis(500),
        ..ProxyConfig::from(&capture_config)
    };
    let (_dir, analyzer, shown) = capture(config, b"printf '%0300d\\n' 0\nexit\n");

    let output: Vec<u8> = analyzer
        .events()
        .iter()
        .filter(|e| e.is_output())
        .inspect(|e| assert!(e.payload.len() <= 16, "chunk of {} bytes", e.payload.len()))
        .flat_map(|e| e.payload.clone())
        .collect();
    assert_eq!(output, shown);
    assert!(String::from_utf8_lossy(&output).contains(&"0".repeat(300)));
}

#[test]
fn timestamps_never_go_backwards() {
    if !pty_available() {
        return;
    }
    let (_dir, analyzer, _) = capture(quick_config(), b"echo a\necho b\necho c\nexit\n");
    let events = analyzer.events();
    assert!(events.windows(2).all(|w| w[0].ts_ns <= w[1].ts_ns));
    assert!(events.iter().enumerate().all(|(i, e)| e.seq == i as u64));
}

#[test]
fn close_handle_ends_idle_session_from_another_thread() {
    if !pty_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("closed.ktr");
    let (input, mut keyboard) = pipe();

    let session = SessionProxy::new(quick_config())
        .start(
            "/bin/sh",
            PtySize::default(),
            &log,
            TerminalEndpoints {
                input,
                output: Box::new(Screen::default()),
            },
        )
        .unwrap();
    keyboard.write_all(b"echo before-close\n").unwrap();

    let handle = session.close_handle();
    let closer = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(300));
        handle.close();
    });
    let summary = session.wait().unwrap();
    closer.join().unwrap();
    drop(keyboard);

    assert_eq!(summary.signal, None);
    let analyzer = Analyzer::open(&log, AnalysisOptions::default()).unwrap();
    let trailer = analyzer.trace().trailer.as_ref().unwrap();
    assert_eq!(trailer.events, summary.events);
    assert!(analyzer.events().iter().any(|e| e.is_input()));
}

#[test]
fn keystrokes_during_output_burst_are_kept_intact() {
    if !pty_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("burst.ktr");
    let (input, mut keyboard) = pipe();
    let screen = Screen::default();

    let session = SessionProxy::new(quick_config())
        .start(
            "/bin/sh",
            PtySize::default(),
            &log,
            TerminalEndpoints {
                input,
                output: Box::new(screen.clone()),
            },
        )
        .unwrap();

    let mut typed = b"i=0; while [ $i -lt 4000 ]; do echo line-$i; i=$((i+1)); done\n".to_vec();
    keyboard.write_all(&typed).unwrap();
    for n in 0..40 {
        let keys = format!("#k{}\n", n).into_bytes();
        keyboard.write_all(&keys).unwrap();
        typed.extend_from_slice(&keys);
        std::thread::sleep(Duration::from_millis(5));
    }
    keyboard.write_all(b"exit\n").unwrap();
    typed.extend_from_slice(b"exit\n");

    let summary = session.wait().unwrap();
    assert!(!summary.is_degraded());

    let analyzer = Analyzer::open(&log, AnalysisOptions::default()).unwrap();
    let collect = |kind: ktrace::EventKind| -> Vec<u8> {
        analyzer
            .events()
            .iter()
            .filter(|e| e.kind == kind)
            .flat_map(|e| e.payload.clone())
            .collect()
    };
    let output = collect(ktrace::EventKind::Output);
    assert_eq!(collect(ktrace::EventKind::Input), typed);
    assert_eq!(output, *screen.0.lock().unwrap());
    assert!(String::from_utf8_lossy(&output).contains("line-3999"));
}

#[test]
fn wait_returns_while_a_background_job_keeps_writing() {
    if !pty_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("spam.ktr");
    let (input, mut keyboard) = pipe();
    let config = ProxyConfig {
        grace_period: Duration::from_millis(300),
        ..ProxyConfig::default()
    };

    let session = SessionProxy::new(config)
        .start(
            "/bin/sh",
            PtySize::default(),
            &log,
            TerminalEndpoints {
                input,
                output: Box::new(Screen::default()),
            },
        )
        .unwrap();
    // Bounded so the job does not outlive the test run for long.
    keyboard
        .write_all(b"(trap '' HUP; i=0; while [ $i -lt 200 ]; do echo spam; sleep 0.02; i=$((i+1)); done) &\nsleep 0.2; exit\n")
        .unwrap();

    let (done_tx, done_rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let _ = done_tx.send(session.wait());
    });
    let summary = done_rx
        .recv_timeout(Duration::from_secs(3))
        .expect("wait() did not return while output kept flowing")
        .unwrap();
    drop(keyboard);

    assert!(!summary.is_degraded());
    let analyzer = Analyzer::open(&log, AnalysisOptions::default()).unwrap();
    assert!(analyzer.trace().trailer.is_some());
}
