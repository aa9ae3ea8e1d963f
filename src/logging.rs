//! Diagnostics logging.
//!
//! The terminal is in raw mode while a session runs and belongs to the
//! recorded shell, so diagnostics always go to a file.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Environment variable that overrides `[logging].level`, e.g.
/// `KTRACE_LOG=ktrace::capture=trace`.
pub const LOG_ENV: &str = "KTRACE_LOG";

/// Filter directive: the environment wins, then `--verbose`, then config.
fn directive(env: Option<String>, verbose: bool, level: &str) -> String {
    match env.filter(|value| !value.trim().is_empty()) {
        Some(value) => value,
        None if verbose => "debug".to_string(),
        None => level.to_ascii_lowercase(),
    }
}

/// Install the global subscriber writing to the configured log file.
///
/// Returns the file in use. Calling it again is harmless.
pub fn init(config: &Config, verbose: bool) -> Result<PathBuf> {
    let path = config.log_file()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {:?}", parent))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file: {:?}", path))?;

    let directive = directive(std::env::var(LOG_ENV).ok(), verbose, &config.logging.level);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    // Already installed (tests, repeated init): keep the first one.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_thread_names(true)
        .try_init();

    Ok(path)
}
