//! Search, segments, stats, freq and ips command handlers

use std::io::{self, Write};

use anyhow::Result;

use ktrace::analysis::{AnalysisOptions, CommandSegment, SearchHit, TraceSummary};

use super::{format_duration, format_offset, open_log, truncate_string};

/// Search a log and print hits, or JSON lines with `--json`.
#[cfg(not(tarpaulin_include))]
pub fn handle_search(
    log: &str,
    pattern: &str,
    case_sensitive: bool,
    regex: bool,
    raw: bool,
    json: bool,
) -> Result<()> {
    let config = ktrace::Config::load()?;
    let defaults = AnalysisOptions::from(&config.analysis);
    let options = AnalysisOptions {
        case_sensitive: case_sensitive || defaults.case_sensitive,
        regex: regex || defaults.regex,
        raw: raw || defaults.raw,
    };
    let (_, analyzer) = open_log(log, Some(options))?;
    let hits = analyzer.search(pattern)?;

    let mut out = io::stdout().lock();
    if json {
        for hit in &hits {
            writeln!(out, "{}", serde_json::to_string(hit)?)?;
        }
        return Ok(());
    }

    for hit in &hits {
        write!(out, "{}", format_hit(hit))?;
    }
    writeln!(out, "{} matching event(s)", hits.len())?;
    Ok(())
}

/// Print the command segments of a log.
#[cfg(not(tarpaulin_include))]
pub fn handle_segments(log: &str) -> Result<()> {
    let (_, analyzer) = open_log(log, None)?;
    let mut out = io::stdout().lock();
    for segment in analyzer.segments() {
        writeln!(out, "{}", format_segment(&segment))?;
    }
    Ok(())
}

/// Print a session summary.
#[cfg(not(tarpaulin_include))]
pub fn handle_stats(log: &str, json: bool) -> Result<()> {
    let (config, analyzer) = open_log(log, None)?;
    let summary = analyzer.summary(config.analysis.top_n);
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", format_summary(&summary));
    }
    Ok(())
}

/// Print the most frequent commands.
#[cfg(not(tarpaulin_include))]
pub fn handle_freq(log: &str, top: Option<usize>) -> Result<()> {
    let (config, analyzer) = open_log(log, None)?;
    let top_n = top.unwrap_or(config.analysis.top_n);
    let entries = analyzer.frequency(top_n);
    if entries.is_empty() {
        println!("No commands recorded.");
    }
    for entry in entries {
        println!("{:>6}  {}", entry.count, entry.key);
    }
    Ok(())
}

/// Print IP addresses seen in the output.
#[cfg(not(tarpaulin_include))]
pub fn handle_ips(log: &str) -> Result<()> {
    let (_, analyzer) = open_log(log, None)?;
    for ip in analyzer.ips() {
        println!("{}", ip);
    }
    Ok(())
}

fn format_hit(hit: &SearchHit) -> String {
    let mut text = format!("{:>6} {:>12} {:<3}", hit.seq, format_offset(hit.ts_ns), hit.kind);
    if let Some(segment) = hit.segment {
        text.push_str(&format!(" [segment {}]", segment));
    }
    text.push('\n');
    for line in &hit.lines {
        text.push_str(&format!("         {}\n", line));
    }
    text
}

fn format_segment(segment: &CommandSegment) -> String {
    let command = match (&segment.command, segment.is_preamble()) {
        (_, true) => "(before first input)".to_string(),
        (Some(command), false) if !command.is_empty() => truncate_string(command, 48),
        _ => "(no visible text)".to_string(),
    };
    format!(
        "#{:<4} {:>12} {:>10}  {:>4} out  {}",
        segment.index,
        format_offset(segment.start_ns),
        format_duration(segment.duration_ns()),
        segment.outputs.len(),
        command
    )
}

fn format_summary(summary: &TraceSummary) -> String {
    let counts = &summary.counts;
    let mut text = format!(
        "Duration:   {}\n\
         Events:     {} ({} in, {} out)\n\
         Bytes:      {} in, {} out\n\
         Lines:      {} in, {} out\n\
         Segments:   {}\n",
        format_duration(summary.duration_ns),
        counts.events,
        counts.input_events,
        counts.output_events,
        counts.input_bytes,
        counts.output_bytes,
        counts.input_lines,
        counts.output_lines,
        summary.segments,
    );
    if !summary.top_commands.is_empty() {
        let top: Vec<String> = summary
            .top_commands
            .iter()
            .map(|e| format!("{} ({})", e.key, e.count))
            .collect();
        text.push_str(&format!("Top:        {}\n", top.join(", ")));
    }
    if !summary.ips.is_empty() {
        let ips: Vec<String> = summary.ips.iter().map(|ip| ip.to_string()).collect();
        text.push_str(&format!("IPs:        {}\n", ips.join(", ")));
    }
    if summary.lost_events > 0 {
        text.push_str(&format!("Lost:       {} event(s) not written during capture\n", summary.lost_events));
    }
    if summary.discarded_bytes > 0 {
        text.push_str(&format!("Discarded:  {} trailing bytes\n", summary.discarded_bytes));
    }
    text
}
