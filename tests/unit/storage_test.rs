//! Unit tests for the session log directory

use std::fs;

use chrono::{Local, TimeZone};
use ktrace::analysis::BookmarkSet;
use ktrace::storage::{generate_filename, sanitize_filename, RenameOutcome};
use ktrace::StorageManager;
use tempfile::TempDir;

use crate::helpers::{config_for, write_log, sample_events};

#[test]
fn default_names_are_timestamps() {
    let now = Local.with_ymd_and_hms(2025, 1, 10, 14, 3, 22).unwrap();
    assert_eq!(generate_filename(now), "2025-01-10_14-03-22.ktr");
}

#[test]
fn sanitize_keeps_safe_characters_only() {
    assert_eq!(sanitize_filename("box 1 / root!"), Some("box1root.ktr".to_string()));
    assert_eq!(sanitize_filename("scan.ktr"), Some("scan.ktr".to_string()));
    assert_eq!(sanitize_filename("!!!"), None);
}

#[test]
fn new_log_path_creates_directory_and_avoids_collisions() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("logs");
    let storage = StorageManager::new(config_for(&dir));
    let now = Local.with_ymd_and_hms(2025, 1, 10, 14, 3, 22).unwrap();

    let first = storage.new_log_path(now).unwrap();
    assert!(dir.is_dir());
    fs::write(&first, "").unwrap();
    let second = storage.new_log_path(now).unwrap();
    assert_eq!(second, dir.join("2025-01-10_14-03-22-1.ktr"));
}

#[test]
fn listing_skips_other_files() {
    let temp = TempDir::new().unwrap();
    write_log(&temp.path().join("a.ktr"), &sample_events());
    fs::write(temp.path().join("a.ktr.bookmarks.json"), "{}").unwrap();
    fs::write(temp.path().join("notes.txt"), "x").unwrap();

    let storage = StorageManager::new(config_for(temp.path()));
    let sessions = storage.list_sessions().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].filename, "a.ktr");
    assert_eq!(storage.get_stats().unwrap().session_count, 1);
}

#[test]
fn rename_moves_bookmarks_along() {
    let temp = TempDir::new().unwrap();
    let log = write_log(&temp.path().join("2025-01-10_14-03-22.ktr"), &sample_events());
    fs::write(BookmarkSet::sidecar_path(&log), r#"{"bookmarks":[]}"#).unwrap();

    let storage = StorageManager::new(config_for(temp.path()));
    let outcome = storage.rename_session(&log, "web01").unwrap();

    let target = temp.path().join("web01.ktr");
    assert_eq!(outcome, RenameOutcome::Renamed(target.clone()));
    assert!(target.exists() && !log.exists());
    assert!(BookmarkSet::sidecar_path(&target).exists());
}

#[test]
fn resolve_accepts_latest() {
    let temp = TempDir::new().unwrap();
    let log = write_log(&temp.path().join("only.ktr"), &sample_events());
    let storage = StorageManager::new(config_for(temp.path()));
    assert_eq!(storage.resolve_log_path("latest"), Some(log.clone()));
    assert_eq!(storage.resolve_log_path("only"), Some(log));
    assert_eq!(storage.resolve_log_path("missing"), None);
}
