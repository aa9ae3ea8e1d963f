//! Unit tests for the session log format

use std::fs;

use ktrace::tracelog::integrity::diagnose;
use ktrace::tracelog::{Event, LogError, LogParser, LogWriter};
use tempfile::TempDir;

use crate::helpers::{sample_events, sample_header, temp_log, write_log};

#[test]
fn written_log_parses_back_unchanged() {
    let (_dir, path) = temp_log("session.ktr");
    let log = LogParser::new(&path).parse().unwrap();

    assert_eq!(log.header, Some(sample_header()));
    assert_eq!(log.events, sample_events());
    assert_eq!(log.trailer.unwrap().events, 7);
    assert_eq!(log.discarded_bytes, 0);
}

#[test]
fn records_can_be_iterated_again() {
    let (_dir, path) = temp_log("session.ktr");
    let parser = LogParser::new(&path);

    let first: Vec<Event> = parser.records().unwrap().map(Result::unwrap).collect();
    let second: Vec<Event> = parser.records().unwrap().take(2).map(Result::unwrap).collect();
    assert_eq!(first.len(), 7);
    assert_eq!(second, first[..2].to_vec());
}

#[test]
fn binary_payloads_survive() {
    let dir = TempDir::new().unwrap();
    let events = vec![
        Event::output(0, 0, vec![0x00, 0xff, b'\t', b'\n', 0x1b, b'[']),
        Event::input(1, 5, vec![0x03]),
    ];
    let path = write_log(&dir.path().join("bin.ktr"), &events);
    assert_eq!(LogParser::new(&path).parse().unwrap().events, events);
}

#[test]
fn log_without_header_or_trailer_is_valid() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bare.ktr");
    let mut writer = LogWriter::create(&path, None).unwrap();
    writer.append(&Event::input(0, 1, b"x".to_vec())).unwrap();
    writer.close(None).unwrap();

    let log = LogParser::new(&path).parse().unwrap();
    assert!(log.header.is_none() && log.trailer.is_none());
    assert_eq!(log.events.len(), 1);
}

#[test]
fn append_after_close_fails() {
    let dir = TempDir::new().unwrap();
    let mut writer = LogWriter::create(dir.path().join("x.ktr"), None).unwrap();
    writer.close(None).unwrap();
    assert!(writer.close(None).is_ok());
    assert!(writer.append(&Event::input(0, 0, b"x".to_vec())).is_err());
}

#[test]
fn missing_file_is_an_open_error() {
    let dir = TempDir::new().unwrap();
    let err = LogParser::new(dir.path().join("absent.ktr")).parse().unwrap_err();
    assert!(matches!(err, LogError::Open { .. }));
}

#[test]
fn mid_file_damage_is_located() {
    let (_dir, path) = temp_log("session.ktr");
    let contents = fs::read_to_string(&path).unwrap();
    let mut lines: Vec<&str> = contents.lines().collect();
    lines[2] = "garbage";
    fs::write(&path, lines.join("\n") + "\n").unwrap();

    match LogParser::new(&path).parse().unwrap_err() {
        LogError::Corrupt(corrupt) => {
            assert_eq!(corrupt.line, 3);
            assert_eq!(corrupt.record_index, Some(1));
        }
        other => panic!("unexpected error: {other}"),
    }

    let diagnosis = diagnose(&path).unwrap();
    assert_eq!(diagnosis.records, 1);
    assert!(diagnosis.corruption.is_some());
    assert!(!diagnosis.is_clean());
}

#[test]
fn clean_log_diagnosis() {
    let (_dir, path) = temp_log("session.ktr");
    let diagnosis = diagnose(&path).unwrap();
    assert!(diagnosis.is_clean());
    assert!(diagnosis.has_header && diagnosis.has_trailer);
    assert_eq!(diagnosis.records, 7);
    assert_eq!(diagnosis.summary(), "7 records, closed cleanly");
}
