//! Export and import command handlers

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};

use ktrace::analysis::export::{export_log, import};
use ktrace::analysis::{BookmarkSet, ExportFilter};
use ktrace::tracelog::{Event, EventKind, LogParser, LogWriter};
use ktrace::Config;

use super::resolve_log;

/// Stream selected events of a log as JSON lines.
#[cfg(not(tarpaulin_include))]
pub fn handle_export(
    log: &str,
    kind: Option<EventKind>,
    from: Option<u64>,
    to: Option<u64>,
    bookmarked: bool,
    output: Option<&Path>,
) -> Result<()> {
    let config = Config::load()?;
    let path = resolve_log(log, &config)?;
    let bookmarks = BookmarkSet::load(&BookmarkSet::sidecar_path(&path))?;
    let filter = ExportFilter {
        kind,
        from_seq: from,
        to_seq: to,
        bookmarked_only: bookmarked,
    };

    let parser = LogParser::new(&path);
    let out: Box<dyn Write> = match output {
        Some(file) => Box::new(BufWriter::new(
            File::create(file).with_context(|| format!("Failed to create {:?}", file))?,
        )),
        None => Box::new(io::stdout().lock()),
    };
    let written = export_log(&parser, out, &filter, Some(&bookmarks))?;

    if let Some(file) = output {
        eprintln!("Exported {} event(s) to {}", written, file.display());
    }
    Ok(())
}

/// Rebuild a session log from a JSON-lines export.
#[cfg(not(tarpaulin_include))]
pub fn handle_import(input: &Path, output: &Path) -> Result<()> {
    let file = File::open(input).with_context(|| format!("Failed to open {:?}", input))?;
    let events = import(BufReader::new(file))?;
    let written = write_imported(events, output)?;
    println!("Imported {} event(s) into {}", written, output.display());
    Ok(())
}

/// Write `events` to a new log, renumbered from 0 so a filtered export
/// still yields a gapless log.
fn write_imported(events: Vec<Event>, output: &Path) -> Result<u64> {
    if output.exists() {
        bail!("{} already exists", output.display());
    }
    if let Some(pair) = events.windows(2).find(|pair| pair[1].ts_ns < pair[0].ts_ns) {
        bail!(
            "Event {} is timestamped before event {}; not a ktrace export",
            pair[1].seq,
            pair[0].seq
        );
    }

    let mut writer = LogWriter::create(output, None)?;
    for (seq, mut event) in events.into_iter().enumerate() {
        event.seq = seq as u64;
        writer.append(&event)?;
    }
    writer.close(None)?;
    Ok(writer.records())
}
