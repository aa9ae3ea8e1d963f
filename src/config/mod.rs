//! Configuration management for ktrace

mod io;
mod types;

pub use types::*;

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Shell used when neither the config nor `$SHELL` names one.
pub const FALLBACK_SHELL: &str = "/bin/bash";

impl Config {
    /// Get the config file path (~/.config/ktrace/config.toml)
    pub fn config_path() -> Result<PathBuf> {
        io::config_path()
    }

    /// Get the config directory path (~/.config/ktrace)
    pub fn config_dir() -> Result<PathBuf> {
        io::config_dir()
    }

    /// Load configuration from file, or return defaults if not found
    pub fn load() -> Result<Self> {
        io::load()
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        io::load_from(path)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        io::save(self)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        io::save_to(self, path)
    }

    /// Reject values the capture and analysis paths cannot work with.
    pub fn validate(&self) -> Result<(), String> {
        if self.capture.max_chunk_bytes == 0 {
            return Err("capture.max_chunk_bytes must be > 0".to_string());
        }
        if self.capture.input_buffer_bytes == 0 || self.capture.output_buffer_bytes == 0 {
            return Err("capture buffer sizes must be > 0".to_string());
        }
        if self.capture.flush_interval_ms == 0 {
            return Err("capture.flush_interval_ms must be > 0".to_string());
        }
        if self.analysis.top_n == 0 {
            return Err("analysis.top_n must be > 0".to_string());
        }
        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(format!(
                "Unknown logging.level '{}'. Valid: {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            ));
        }
        Ok(())
    }

    /// Expand ~ in storage directory path
    pub fn storage_directory(&self) -> PathBuf {
        expand_tilde(&self.storage.directory)
    }

    /// Diagnostics log file, `[logging].file` or `ktrace.log` in the config dir.
    pub fn log_file(&self) -> Result<PathBuf> {
        match &self.logging.file {
            Some(file) => Ok(expand_tilde(file)),
            None => Ok(Self::config_dir()?.join("ktrace.log")),
        }
    }

    /// Shell to record: explicit override, then `[capture].shell`, then
    /// `$SHELL`, then `/bin/bash`.
    pub fn resolve_shell(&self, override_shell: Option<&str>) -> String {
        override_shell
            .map(str::to_string)
            .or_else(|| self.capture.shell.clone())
            .or_else(|| std::env::var("SHELL").ok().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| FALLBACK_SHELL.to_string())
    }
}

/// Expand a leading `~/` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
