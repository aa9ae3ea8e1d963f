//! Test helper utilities

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};
use tempfile::TempDir;

use ktrace::tracelog::{Event, LogWriter, SessionHeader, SessionTrailer};
use ktrace::Config;

pub const SECOND: u64 = 1_000_000_000;

/// Wall-clock start of the sample session.
pub fn started_at() -> DateTime<Local> {
    Local.with_ymd_and_hms(2024, 5, 17, 10, 0, 0).unwrap()
}

/// A short session: a banner, two nmap runs and a file read.
pub fn sample_events() -> Vec<Event> {
    vec![
        Event::output(0, 0, b"Welcome to box\r\n$ ".to_vec()),
        Event::input(1, SECOND, b"nmap -sV 10.10.10.5\r".to_vec()),
        Event::output(
            2,
            SECOND + SECOND / 10,
            b"nmap -sV 10.10.10.5\r\nStarting Nmap\r\n22/tcp open ssh\r\nHost 10.10.10.5 is up\r\n$ "
                .to_vec(),
        ),
        Event::input(3, 5 * SECOND, b"cat /etc/hostname\r".to_vec()),
        Event::output(4, 5 * SECOND + SECOND / 20, b"cat /etc/hostname\r\nkali\r\n$ ".to_vec()),
        Event::input(5, 9 * SECOND, b"nmap -p- 10.10.10.6\r".to_vec()),
        Event::output(6, 9 * SECOND + SECOND / 2, b"Error: Permission denied\r\n$ ".to_vec()),
    ]
}

pub fn sample_header() -> SessionHeader {
    SessionHeader::new("/bin/bash", started_at(), Some((80, 24)))
}

pub fn sample_trailer(events: &[Event]) -> SessionTrailer {
    let duration_ns = events.last().map(|e| e.ts_ns).unwrap_or(0);
    SessionTrailer {
        ended_at: started_at() + chrono::Duration::seconds(10),
        duration_ns,
        events: events.len() as u64,
        lost_events: 0,
        exit_code: Some(0),
    }
}

/// Write a complete log (header, events, trailer) to `path`.
pub fn write_log(path: &Path, events: &[Event]) -> PathBuf {
    let mut writer = LogWriter::create(path, Some(&sample_header())).unwrap();
    for event in events {
        writer.append(event).unwrap();
    }
    writer.close(Some(&sample_trailer(events))).unwrap();
    path.to_path_buf()
}

/// Sample log as `name` in a fresh temp dir.
pub fn temp_log(name: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_log(&dir.path().join(name), &sample_events());
    (dir, path)
}

/// Config whose log directory is `dir`.
pub fn config_for(dir: &Path) -> Config {
    let mut config = Config::default();
    config.storage.directory = dir.to_string_lossy().to_string();
    config
}

/// `HOME` for CLI tests: the default log dir `~/.kali-logs` holds the
/// sample session as `box1.ktr`.
pub fn temp_home() -> (TempDir, PathBuf) {
    let home = TempDir::new().expect("Failed to create temp home");
    let logs = home.path().join(".kali-logs");
    std::fs::create_dir_all(&logs).unwrap();
    let log = write_log(&logs.join("box1.ktr"), &sample_events());
    (home, log)
}
