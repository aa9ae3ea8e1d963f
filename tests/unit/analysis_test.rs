//! Unit tests for the analysis engine over a recorded session

use std::net::IpAddr;

use ktrace::analysis::{AnalysisOptions, Analyzer, BookmarkSet, ExportFilter};
use ktrace::tracelog::EventKind;

use crate::helpers::{started_at, temp_log, SECOND};

fn open(options: AnalysisOptions) -> (tempfile::TempDir, Analyzer) {
    let (dir, path) = temp_log("session.ktr");
    (dir, Analyzer::open(&path, options).unwrap())
}

#[test]
fn search_is_case_insensitive_by_default() {
    let (_dir, analyzer) = open(AnalysisOptions::default());
    let hits = analyzer.search("error").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].seq, 6);
    assert_eq!(hits[0].segment, Some(3));
    assert_eq!(hits[0].lines, vec!["Error: Permission denied"]);
}

#[test]
fn case_sensitive_search_respects_case() {
    let (_dir, analyzer) = open(AnalysisOptions {
        case_sensitive: true,
        ..AnalysisOptions::default()
    });
    assert!(analyzer.search("error").unwrap().is_empty());
    assert_eq!(analyzer.search("Error").unwrap().len(), 1);
}

#[test]
fn literal_search_does_not_interpret_regex() {
    let (_dir, analyzer) = open(AnalysisOptions::default());
    assert!(analyzer.search("10.10.10.[56]").unwrap().is_empty());

    let regex = analyzer.with_options(AnalysisOptions {
        regex: true,
        ..AnalysisOptions::default()
    });
    let seqs: Vec<u64> = regex
        .search(r"10\.10\.10\.[56]")
        .unwrap()
        .iter()
        .map(|h| h.seq)
        .collect();
    assert_eq!(seqs, vec![1, 2, 5]);
}

#[test]
fn segments_follow_input_events() {
    let (_dir, analyzer) = open(AnalysisOptions::default());
    let segments = analyzer.segments();
    assert_eq!(segments.len(), 4);
    assert!(segments[0].is_preamble());
    assert_eq!(segments[1].command.as_deref(), Some("nmap -sV 10.10.10.5"));
    assert_eq!(segments[1].outputs, vec![2]);
    assert_eq!(segments[3].duration_ns(), SECOND / 2);
}

#[test]
fn stats_over_sample_session() {
    let (_dir, analyzer) = open(AnalysisOptions::default());
    assert_eq!(analyzer.duration_ns(), 9 * SECOND + SECOND / 2);

    let counts = analyzer.line_counts();
    assert_eq!(counts.events, 7);
    assert_eq!(counts.input_events, 3);
    assert_eq!(counts.output_events, 4);
    assert_eq!(counts.input_lines, 3);
    assert_eq!(counts.output_lines, 9);

    let top = analyzer.frequency(1);
    assert_eq!(top.len(), 1);
    assert_eq!((top[0].key.as_str(), top[0].count), ("nmap", 2));
}

#[test]
fn ips_come_from_output_only() {
    let (_dir, analyzer) = open(AnalysisOptions::default());
    let expected: IpAddr = "10.10.10.5".parse().unwrap();
    assert_eq!(analyzer.ips(), vec![expected]);
}

#[test]
fn clean_lines_carry_wall_clock_time() {
    let (_dir, analyzer) = open(AnalysisOptions::default());
    let lines: Vec<String> = analyzer
        .clean_lines()
        .iter()
        .map(|l| l.format(Some(started_at())))
        .collect();
    assert_eq!(lines[0], "[2024-05-17 10:00:00] Welcome to box");
    assert_eq!(lines[1], "[2024-05-17 10:00:01] $ nmap -sV 10.10.10.5");
    assert!(lines.contains(&"[2024-05-17 10:00:05] kali".to_string()));
}

#[test]
fn summary_matches_individual_queries() {
    let (_dir, analyzer) = open(AnalysisOptions::default());
    let summary = analyzer.summary(3);
    assert_eq!(summary.duration_ns, analyzer.duration_ns());
    assert_eq!(summary.counts, analyzer.line_counts());
    assert_eq!(summary.segments, 4);
    assert_eq!(summary.top_commands, analyzer.frequency(3));
    assert_eq!(summary.ips, analyzer.ips());
}

#[test]
fn bookmarks_persist_beside_the_log() {
    let (_dir, path) = temp_log("session.ktr");
    let analyzer = Analyzer::open(&path, AnalysisOptions::default()).unwrap();
    let sidecar = BookmarkSet::sidecar_path(&path);

    let mut marks = BookmarkSet::load(&sidecar).unwrap();
    marks.add(analyzer.trace(), 4, "hostname found").unwrap();
    assert!(marks.add(analyzer.trace(), 70, "nope").is_err());
    marks.save(&sidecar).unwrap();

    let reloaded = BookmarkSet::load(&sidecar).unwrap();
    assert_eq!(reloaded.note(4), Some("hostname found"));
    assert_eq!(reloaded.len(), 1);
}

#[test]
fn export_filters_by_kind_and_range() {
    let (_dir, analyzer) = open(AnalysisOptions::default());
    let filter = ExportFilter {
        kind: Some(EventKind::Input),
        from_seq: Some(2),
        to_seq: Some(5),
        ..ExportFilter::default()
    };
    let mut out = Vec::new();
    let written = analyzer.export(&mut out, &filter, None).unwrap();
    assert_eq!(written, 2);

    let text = String::from_utf8(out).unwrap();
    let seqs: Vec<u64> = text
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["seq"].as_u64().unwrap())
        .collect();
    assert_eq!(seqs, vec![3, 5]);
}
