//! Record command handler

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

use ktrace::capture::signals::{reraise, signal_name};
use ktrace::capture::{
    terminal, ProxyConfig, RawModeGuard, SessionProxy, SessionSummary, SignalWatch,
    TerminalEndpoints,
};
use ktrace::storage::RenameOutcome;
use ktrace::{Config, StorageManager};

use super::format_duration;

/// Record an interactive shell session.
///
/// Runs the shell on a new pty with the real terminal in raw mode, then
/// offers to rename the log. A signal that ended the session is re-raised
/// once the log is closed and the terminal restored.
#[cfg(not(tarpaulin_include))]
pub fn handle(
    shell: Option<&str>,
    name: Option<&str>,
    no_rename: bool,
    args: &[String],
) -> Result<()> {
    let config = Config::load()?;
    let storage = StorageManager::new(config.clone());
    let log_path = storage.new_log_path(Local::now())?;
    let shell = config.resolve_shell(shell);
    let size = terminal::inherited_size().unwrap_or_default();

    let mut proxy_config = ProxyConfig::from(&config.capture);
    proxy_config.shell_args = args.to_vec();

    println!("{}", start_banner(&log_path, &shell));

    let mut raw = RawModeGuard::enter().context("Failed to put the terminal in raw mode")?;
    let mut signals = SignalWatch::new();
    signals.register();

    let endpoints = TerminalEndpoints::stdio().context("Failed to attach to the terminal")?;
    let session = SessionProxy::new(proxy_config)
        .start(&shell, size, &log_path, endpoints)
        .with_context(|| format!("Failed to start {}", shell))?
        .with_signals(signals);

    let result = session.wait();
    raw.restore();
    let summary = result.context("Failed to close the session log")?;

    println!("{}", end_banner(&summary));
    for loss in &summary.losses {
        eprintln!("   Lost: {}", loss);
    }

    if summary.signal.is_none() {
        match name {
            Some(requested) => {
                apply_name(&storage, &summary.log_path, requested)?;
            }
            None if !no_rename && terminal::stdin_is_tty() => {
                prompt_rename(&storage, &summary.log_path)?;
            }
            None => {}
        }
    }

    if let Some(signal) = summary.signal {
        reraise(signal);
    }
    Ok(())
}

fn start_banner(log_path: &Path, shell: &str) -> String {
    format!(
        "ktrace: recording {} to {}\nktrace: exit the shell (exit or Ctrl+D) to stop recording",
        shell,
        log_path.display()
    )
}

fn end_banner(summary: &SessionSummary) -> String {
    let mut banner = format!(
        "ktrace: session ended after {}, {} events saved to {}",
        format_duration(summary.duration.as_nanos() as u64),
        summary.events,
        summary.log_path.display()
    );
    match (summary.signal, summary.exit_code) {
        (Some(signal), _) => {
            banner.push_str(&format!("\nktrace: stopped by {}", signal_name(signal)));
        }
        (None, Some(code)) if code != 0 => {
            banner.push_str(&format!("\nktrace: shell exited with status {}", code));
        }
        (None, None) => banner.push_str("\nktrace: shell was killed by a signal"),
        _ => {}
    }
    if summary.is_degraded() {
        banner.push_str(&format!(
            "\nktrace: WARNING: {} event(s) could not be written, the log is incomplete",
            summary.losses.len()
        ));
    }
    banner
}

/// Ask for a new name on the terminal.
#[cfg(not(tarpaulin_include))]
fn prompt_rename(storage: &StorageManager, log_path: &Path) -> Result<PathBuf> {
    let current = log_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    print!("Session complete. Enter a name (or press Enter to keep '{}'): ", current);
    io::stdout().flush()?;

    match read_name(io::stdin().lock())? {
        Some(requested) => apply_name(storage, log_path, &requested),
        None => {
            println!("Keeping filename: {}", current);
            Ok(log_path.to_path_buf())
        }
    }
}

/// One line of input, `None` when blank or at EOF.
fn read_name<R: BufRead>(mut input: R) -> Result<Option<String>> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    let line = line.trim();
    Ok((!line.is_empty()).then(|| line.to_string()))
}

fn apply_name(storage: &StorageManager, log_path: &Path, requested: &str) -> Result<PathBuf> {
    match storage.rename_session(log_path, requested)? {
        RenameOutcome::Renamed(path) => {
            println!("Saved as: {}", path.display());
            Ok(path)
        }
        RenameOutcome::InvalidName => {
            println!("'{}' is not a usable name. Keeping original.", requested);
            Ok(log_path.to_path_buf())
        }
        RenameOutcome::AlreadyExists(path) => {
            println!(
                "File '{}' already exists. Keeping original.",
                path.file_name().unwrap_or_default().to_string_lossy()
            );
            Ok(log_path.to_path_buf())
        }
    }
}
