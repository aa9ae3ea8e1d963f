//! Logs cut short by a crash or power loss

use std::fs::OpenOptions;
use std::io::Write;

use ktrace::analysis::export::export_log;
use ktrace::analysis::{AnalysisOptions, Analyzer, ExportFilter};
use ktrace::tracelog::integrity::diagnose;
use ktrace::tracelog::{LogParser, LogWriter};
use tempfile::TempDir;

use crate::helpers::{sample_events, sample_header};

/// Sample session without a trailer, followed by half a record.
fn truncated_log(dir: &TempDir, fragment: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join("crashed.ktr");
    let mut writer = LogWriter::create(&path, Some(&sample_header())).unwrap();
    for event in sample_events() {
        writer.append(&event).unwrap();
    }
    writer.close(None).unwrap();

    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(fragment).unwrap();
    path
}

#[test]
fn partial_record_is_discarded_and_counted() {
    let dir = TempDir::new().unwrap();
    let path = truncated_log(&dir, b"7\t9600000000\tOUT\tZm9v");

    let log = LogParser::new(&path).parse().unwrap();
    assert_eq!(log.events, sample_events());
    assert_eq!(log.discarded_bytes, 21);
    assert!(log.trailer.is_none());
}

#[test]
fn analysis_still_works_on_truncated_log() {
    let dir = TempDir::new().unwrap();
    let path = truncated_log(&dir, b"7\t96");

    let analyzer = Analyzer::open(&path, AnalysisOptions::default()).unwrap();
    assert_eq!(analyzer.search("kali").unwrap().len(), 1);
    assert_eq!(analyzer.summary(5).discarded_bytes, 4);
}

#[test]
fn diagnosis_reports_truncation_not_corruption() {
    let dir = TempDir::new().unwrap();
    let path = truncated_log(&dir, b"7\t96");

    let diagnosis = diagnose(&path).unwrap();
    assert_eq!(diagnosis.records, 7);
    assert_eq!(diagnosis.discarded_bytes, 4);
    assert!(diagnosis.corruption.is_none());
    assert!(!diagnosis.has_trailer);
    insta::assert_snapshot!(diagnosis.summary(), @r"
    7 records, no trailer (session did not close cleanly)
       Truncated: 4 trailing bytes discarded
    ");
}

#[test]
fn streaming_export_stops_at_the_fragment() {
    let dir = TempDir::new().unwrap();
    let path = truncated_log(&dir, b"7\t9600000000\tOUT\tZm9v");

    let mut out = Vec::new();
    let written = export_log(&LogParser::new(&path), &mut out, &ExportFilter::default(), None).unwrap();
    assert_eq!(written, 7);
}
