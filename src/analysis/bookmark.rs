//! Bookmarks: notes attached to event sequence numbers.
//!
//! Bookmarks never touch the session log. The CLI keeps them in a sidecar
//! file next to it, `<log>.bookmarks.json`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::AnalysisError;
use super::SessionTrace;

/// A note on one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub seq: u64,
    pub note: String,
}

#[derive(Serialize, Deserialize)]
struct BookmarkFile {
    bookmarks: Vec<Bookmark>,
}

/// Bookmarks of one session, ordered by sequence number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkSet {
    marks: BTreeMap<u64, String>,
}

impl BookmarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bookmark event `seq` of `trace`. Re-adding replaces the note and
    /// returns the previous one.
    pub fn add(
        &mut self,
        trace: &SessionTrace,
        seq: u64,
        note: impl Into<String>,
    ) -> Result<Option<String>, AnalysisError> {
        if trace.event(seq).is_none() {
            return Err(AnalysisError::UnknownEvent(seq));
        }
        Ok(self.marks.insert(seq, note.into()))
    }

    pub fn remove(&mut self, seq: u64) -> Option<String> {
        self.marks.remove(&seq)
    }

    pub fn note(&self, seq: u64) -> Option<&str> {
        self.marks.get(&seq).map(String::as_str)
    }

    pub fn contains(&self, seq: u64) -> bool {
        self.marks.contains_key(&seq)
    }

    pub fn list(&self) -> Vec<Bookmark> {
        self.marks
            .iter()
            .map(|(&seq, note)| Bookmark {
                seq,
                note: note.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Sidecar file holding the bookmarks of `log`.
    pub fn sidecar_path(log: &Path) -> PathBuf {
        let mut name = log.file_name().unwrap_or_default().to_os_string();
        name.push(".bookmarks.json");
        log.with_file_name(name)
    }

    /// Load from `path`; a missing file is an empty set.
    pub fn load(path: &Path) -> Result<Self, AnalysisError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| AnalysisError::BookmarkIo {
            path: path.to_path_buf(),
            source,
        })?;
        let file: BookmarkFile =
            serde_json::from_str(&contents).map_err(|source| AnalysisError::BookmarkFormat {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            marks: file.bookmarks.into_iter().map(|b| (b.seq, b.note)).collect(),
        })
    }

    /// Write to `path`; an empty set removes the file.
    pub fn save(&self, path: &Path) -> Result<(), AnalysisError> {
        let io_err = |source| AnalysisError::BookmarkIo {
            path: path.to_path_buf(),
            source,
        };
        if self.is_empty() {
            if path.exists() {
                fs::remove_file(path).map_err(io_err)?;
            }
            return Ok(());
        }
        let file = BookmarkFile {
            bookmarks: self.list(),
        };
        let contents = serde_json::to_string_pretty(&file).map_err(|source| AnalysisError::BookmarkFormat {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, contents + "\n").map_err(io_err)?;
        debug!(path = %path.display(), count = self.len(), "bookmarks saved");
        Ok(())
    }
}
