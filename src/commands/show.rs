//! Show and clean command handlers

use std::io::{self, Write};

use anyhow::Result;

use ktrace::analysis::text::plain_text;
use ktrace::tracelog::Event;

use super::{format_offset, open_log};

/// Print every event of a log.
#[cfg(not(tarpaulin_include))]
pub fn handle_show(log: &str, raw: bool) -> Result<()> {
    let (_, analyzer) = open_log(log, None)?;
    let trace = analyzer.trace();

    let mut out = io::stdout().lock();
    if let Some(header) = &trace.header {
        writeln!(
            out,
            "Session: {} started {}",
            header.shell,
            header.started_at.format("%Y-%m-%d %H:%M:%S")
        )?;
    }
    for event in analyzer.events() {
        writeln!(out, "{}", format_event(event, raw))?;
    }
    match &trace.trailer {
        Some(trailer) => writeln!(out, "Closed cleanly, {} events", trailer.events)?,
        None => writeln!(out, "No trailer: the session did not close cleanly")?,
    }
    Ok(())
}

/// Print the reconstructed output as timestamped clean lines.
#[cfg(not(tarpaulin_include))]
pub fn handle_clean(log: &str) -> Result<()> {
    let (_, analyzer) = open_log(log, None)?;
    let started_at = analyzer.trace().header.as_ref().map(|h| h.started_at);

    let mut out = io::stdout().lock();
    for line in analyzer.clean_lines() {
        writeln!(out, "{}", line.format(started_at))?;
    }
    Ok(())
}

/// `  seq  +offset  KIND  text`, continuation lines indented under the text.
pub(crate) fn format_event(event: &Event, raw: bool) -> String {
    let prefix = format!("{:>6} {:>12} {:<3} ", event.seq, format_offset(event.ts_ns), event.kind);
    if raw {
        return format!("{}{}", prefix, event.text_lossy().escape_debug());
    }
    let text = plain_text(&event.payload);
    let indent = " ".repeat(prefix.len());
    let body = text
        .trim_end_matches('\n')
        .split('\n')
        .collect::<Vec<_>>()
        .join(&format!("\n{}", indent));
    format!("{}{}", prefix, body)
}
