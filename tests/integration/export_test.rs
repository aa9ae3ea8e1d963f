//! JSON-lines export from log files

use ktrace::analysis::export::{export_log, import_records};
use ktrace::analysis::{AnalysisOptions, Analyzer, BookmarkSet, ExportFilter};
use ktrace::tracelog::LogParser;

use crate::helpers::{sample_events, temp_log};

#[test]
fn streaming_and_in_memory_exports_agree() {
    let (_dir, path) = temp_log("session.ktr");
    let analyzer = Analyzer::open(&path, AnalysisOptions::default()).unwrap();
    let mut marks = BookmarkSet::new();
    marks.add(analyzer.trace(), 2, "scan result").unwrap();

    let mut streamed = Vec::new();
    export_log(&LogParser::new(&path), &mut streamed, &ExportFilter::default(), Some(&marks)).unwrap();
    let mut in_memory = Vec::new();
    analyzer
        .export(&mut in_memory, &ExportFilter::default(), Some(&marks))
        .unwrap();

    assert_eq!(streamed, in_memory);
}

#[test]
fn exported_records_read_back() {
    let (_dir, path) = temp_log("session.ktr");
    let mut out = Vec::new();
    export_log(&LogParser::new(&path), &mut out, &ExportFilter::default(), None).unwrap();

    let records = import_records(out.as_slice()).unwrap();
    assert_eq!(records.len(), 7);
    assert_eq!(records[4].payload.as_deref(), Some("cat /etc/hostname\r\nkali\r\n$ "));
    assert!(records.iter().all(|r| r.note.is_none() && r.payload_b64.is_none()));

    let events: Vec<_> = records.iter().map(|r| r.to_event().unwrap()).collect();
    assert_eq!(events, sample_events());
}

#[test]
fn bookmarked_only_export() {
    let (_dir, path) = temp_log("session.ktr");
    let analyzer = Analyzer::open(&path, AnalysisOptions::default()).unwrap();
    let mut marks = BookmarkSet::new();
    marks.add(analyzer.trace(), 6, "denied").unwrap();
    marks.add(analyzer.trace(), 1, "first scan").unwrap();

    let filter = ExportFilter {
        bookmarked_only: true,
        ..ExportFilter::default()
    };
    let mut out = Vec::new();
    assert_eq!(analyzer.export(&mut out, &filter, Some(&marks)).unwrap(), 2);
    let notes: Vec<String> = import_records(out.as_slice())
        .unwrap()
        .into_iter()
        .filter_map(|r| r.note)
        .collect();
    assert_eq!(notes, vec!["first scan", "denied"]);
}
