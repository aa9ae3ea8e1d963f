//! Storage management for session logs

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use humansize::{format_size, BINARY};
use std::fs;
use std::path::{Path, PathBuf};

use crate::analysis::BookmarkSet;
use crate::config::Config;
use crate::tracelog::LOG_EXTENSION;

/// Information about a recorded session
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub path: PathBuf,
    pub filename: String,
    pub size: u64,
    pub modified: DateTime<Local>,
    pub age_days: i64,
    pub age_hours: i64,
    pub age_minutes: i64,
}

impl SessionInfo {
    /// Get human-readable size
    pub fn size_human(&self) -> String {
        format_size(self.size, BINARY)
    }

    /// Format age for display - smart format based on age
    /// - <1 hour: "  45m" (minutes only)
    /// - <1 day:  "   5h" (hours only)
    /// - >=1 day: "   3d" (days only)
    pub fn format_age(&self) -> String {
        if self.age_hours == 0 {
            format!("{:>4}m", self.age_minutes)
        } else if self.age_days == 0 {
            format!("{:>4}h", self.age_hours)
        } else {
            format!("{:>4}d", self.age_days)
        }
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    pub total_size: u64,
    pub session_count: usize,
    pub oldest_session: Option<SessionInfo>,
}

impl StorageStats {
    /// Get human-readable total size
    pub fn size_human(&self) -> String {
        format_size(self.total_size, BINARY)
    }

    /// Format a summary for display
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Session logs: {} in {} sessions",
            self.size_human(),
            self.session_count
        );
        if let Some(oldest) = &self.oldest_session {
            summary.push_str(&format!(
                "\n   Oldest: {} ({} days ago)",
                oldest.modified.format("%Y-%m-%d"),
                oldest.age_days
            ));
        }
        summary
    }
}

/// Result of asking to rename a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed(PathBuf),
    /// Nothing usable was left after sanitizing.
    InvalidName,
    /// A session with that name already exists; nothing was moved.
    AlreadyExists(PathBuf),
}

/// Timestamped default name of a new session log.
pub fn generate_filename(now: DateTime<Local>) -> String {
    format!("{}.{}", now.format("%Y-%m-%d_%H-%M-%S"), LOG_EXTENSION)
}

/// Keep only `[A-Za-z0-9._-]` and make sure the name ends in `.ktr`.
///
/// Returns `None` when nothing but the extension would remain.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let sanitized: String = name
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let suffix = format!(".{}", LOG_EXTENSION);
    let stem = sanitized.strip_suffix(&suffix).unwrap_or(&sanitized);
    if stem.trim_matches('.').is_empty() {
        return None;
    }
    Some(format!("{}{}", stem, suffix))
}

/// Storage manager for session logs
pub struct StorageManager {
    config: Config,
}

impl StorageManager {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Get the storage directory path
    pub fn storage_dir(&self) -> PathBuf {
        self.config.storage_directory()
    }

    /// Ensure the storage directory exists
    pub fn ensure_storage_dir(&self) -> Result<PathBuf> {
        let dir = self.storage_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create storage directory: {:?}", dir))?;
        }
        Ok(dir)
    }

    /// Path for a new session started at `now`. Never an existing file.
    pub fn new_log_path(&self, now: DateTime<Local>) -> Result<PathBuf> {
        let dir = self.ensure_storage_dir()?;
        let path = dir.join(generate_filename(now));
        if !path.exists() {
            return Ok(path);
        }
        // Two sessions started within the same second.
        let stem = now.format("%Y-%m-%d_%H-%M-%S").to_string();
        (1..)
            .map(|n| dir.join(format!("{}-{}.{}", stem, n, LOG_EXTENSION)))
            .find(|candidate| !candidate.exists())
            .context("No free session file name")
    }

    /// List all session logs, oldest first
    pub fn list_sessions(&self) -> Result<Vec<SessionInfo>> {
        let storage_dir = self.storage_dir();
        if !storage_dir.exists() {
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();
        let now = Local::now();

        for entry in fs::read_dir(&storage_dir)
            .with_context(|| format!("Failed to read storage directory: {:?}", storage_dir))?
        {
            let path = entry?.path();
            if !path.is_file() || !path.extension().is_some_and(|ext| ext == LOG_EXTENSION) {
                continue;
            }

            let metadata = fs::metadata(&path)?;
            let modified: DateTime<Local> = metadata.modified()?.into();
            let duration = now - modified;

            sessions.push(SessionInfo {
                filename: path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("")
                    .to_string(),
                size: metadata.len(),
                modified,
                age_days: duration.num_days(),
                age_hours: duration.num_hours(),
                age_minutes: duration.num_minutes(),
                path,
            });
        }

        sessions.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.filename.cmp(&b.filename)));
        Ok(sessions)
    }

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        let sessions = self.list_sessions()?;
        Ok(StorageStats {
            total_size: sessions.iter().map(|s| s.size).sum(),
            session_count: sessions.len(),
            oldest_session: sessions.first().cloned(),
        })
    }

    /// Resolve what the user typed to a session log.
    ///
    /// Accepts an existing path, a file name in the storage directory (with
    /// or without `.ktr`), or `latest` for the most recent session.
    pub fn resolve_log_path(&self, name: &str) -> Option<PathBuf> {
        if name == "latest" {
            return self
                .list_sessions()
                .ok()?
                .into_iter()
                .max_by(|a, b| a.modified.cmp(&b.modified))
                .map(|s| s.path);
        }

        let path_buf = PathBuf::from(name);
        if path_buf.is_file() {
            return Some(path_buf);
        }
        if path_buf.is_absolute() {
            return None;
        }

        let dir = self.storage_dir();
        let direct = dir.join(name);
        if direct.is_file() {
            return Some(direct);
        }
        let with_ext = dir.join(format!("{}.{}", name, LOG_EXTENSION));
        with_ext.is_file().then_some(with_ext)
    }

    /// Rename a finished session log (and its bookmarks) to `requested`.
    pub fn rename_session(&self, log: &Path, requested: &str) -> Result<RenameOutcome> {
        let Some(filename) = sanitize_filename(requested) else {
            return Ok(RenameOutcome::InvalidName);
        };
        let target = log.with_file_name(&filename);
        if target.exists() {
            return Ok(RenameOutcome::AlreadyExists(target));
        }

        fs::rename(log, &target).with_context(|| format!("Failed to rename {:?} to {:?}", log, target))?;

        let sidecar = BookmarkSet::sidecar_path(log);
        if sidecar.exists() {
            fs::rename(&sidecar, BookmarkSet::sidecar_path(&target))
                .with_context(|| format!("Failed to move bookmarks {:?}", sidecar))?;
        }
        Ok(RenameOutcome::Renamed(target))
    }
}
