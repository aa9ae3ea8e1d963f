//! Configuration type definitions and defaults

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where session logs are kept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_directory")]
    pub directory: String,
}

pub fn default_directory() -> String {
    "~/.kali-logs".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
        }
    }
}

/// Capture pipeline tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Shell to record; falls back to `$SHELL`, then `/bin/bash`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    /// Output chunk is flushed after this much silence from the shell
    #[serde(default = "default_idle_gap_ms")]
    pub idle_gap_ms: u64,
    /// Output chunk is flushed once it reaches this size
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: usize,
    /// How often the writer checks for an idle chunk
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// Time a hung shell gets after SIGHUP before it is killed
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
    #[serde(default = "default_input_buffer_bytes")]
    pub input_buffer_bytes: usize,
    #[serde(default = "default_output_buffer_bytes")]
    pub output_buffer_bytes: usize,
}

pub fn default_idle_gap_ms() -> u64 {
    50
}

pub fn default_max_chunk_bytes() -> usize {
    16 * 1024
}

pub fn default_flush_interval_ms() -> u64 {
    20
}

pub fn default_grace_period_ms() -> u64 {
    2000
}

pub fn default_input_buffer_bytes() -> usize {
    1024
}

pub fn default_output_buffer_bytes() -> usize {
    10240
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            shell: None,
            idle_gap_ms: default_idle_gap_ms(),
            max_chunk_bytes: default_max_chunk_bytes(),
            flush_interval_ms: default_flush_interval_ms(),
            grace_period_ms: default_grace_period_ms(),
            input_buffer_bytes: default_input_buffer_bytes(),
            output_buffer_bytes: default_output_buffer_bytes(),
        }
    }
}

/// Default query options, overridable per command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub regex: bool,
    /// Skip command segment grouping
    #[serde(default)]
    pub raw: bool,
    /// Rows shown by `ktrace freq`
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

pub fn default_top_n() -> usize {
    10
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            regex: false,
            raw: false,
            top_n: default_top_n(),
        }
    }
}

/// Diagnostics written by ktrace itself (never to the terminal)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// Log file; defaults to `ktrace.log` next to the config file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

pub fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
        }
    }
}

/// Levels accepted in `[logging].level`.
pub const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace", "off"];
