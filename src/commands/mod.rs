//! Command handlers for the ktrace CLI.
//!
//! Each submodule handles a specific CLI command or command group.
//! The main dispatch logic remains in main.rs.

pub mod analyze;
pub mod bookmark;
pub mod completions;
pub mod config;
pub mod export;
pub mod list;
pub mod record;
pub mod show;
pub mod verify;

use anyhow::{bail, Result};
use std::path::PathBuf;

use ktrace::analysis::{AnalysisOptions, Analyzer};
use ktrace::{Config, StorageManager};

/// Truncate a string to a maximum length, adding ellipsis if needed.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_len {
        s.to_string()
    } else if max_len > 3 {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    } else {
        s.chars().take(max_len).collect()
    }
}

/// Resolve a `<LOG>` argument: a path, a name in the log directory, or `latest`.
pub fn resolve_log(log: &str, config: &Config) -> Result<PathBuf> {
    let storage = StorageManager::new(config.clone());
    match storage.resolve_log_path(log) {
        Some(path) => Ok(path),
        None if log == "latest" => bail!("No sessions found in {}", storage.storage_dir().display()),
        None => bail!("Log not found: {}", log),
    }
}

/// Load config, resolve `log` and parse it.
pub fn open_log(log: &str, options: Option<AnalysisOptions>) -> Result<(Config, Analyzer)> {
    let config = Config::load()?;
    let path = resolve_log(log, &config)?;
    let options = options.unwrap_or_else(|| AnalysisOptions::from(&config.analysis));
    let analyzer = Analyzer::open(&path, options)?;
    if analyzer.trace().discarded_bytes > 0 {
        eprintln!(
            "Note: {} trailing bytes of an interrupted write were ignored.",
            analyzer.trace().discarded_bytes
        );
    }
    if !analyzer.trace().lost.is_empty() {
        eprintln!(
            "Note: {} event(s) could not be written during capture and are missing.",
            analyzer.trace().lost.len()
        );
    }
    Ok((config, analyzer))
}

/// Time offset from session start, e.g. `+12.345s`.
pub fn format_offset(ts_ns: u64) -> String {
    format!("+{:.3}s", ts_ns as f64 / 1e9)
}

/// Duration in the largest sensible unit.
pub fn format_duration(ns: u64) -> String {
    let secs = ns / 1_000_000_000;
    if secs >= 3600 {
        format!("{}h {:02}m {:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.3}s", ns as f64 / 1e9)
    }
}
