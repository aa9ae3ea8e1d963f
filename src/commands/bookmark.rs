//! Bookmark subcommands handler

use anyhow::{bail, Result};

use ktrace::analysis::{AnalysisOptions, Analyzer, BookmarkSet};
use ktrace::Config;

use super::{format_offset, resolve_log, truncate_string};

/// Bookmark event `seq` with `note`.
#[cfg(not(tarpaulin_include))]
pub fn handle_add(log: &str, seq: u64, note: &str) -> Result<()> {
    let config = Config::load()?;
    let path = resolve_log(log, &config)?;
    let analyzer = Analyzer::open(&path, AnalysisOptions::default())?;

    let sidecar = BookmarkSet::sidecar_path(&path);
    let mut bookmarks = BookmarkSet::load(&sidecar)?;
    let previous = bookmarks.add(analyzer.trace(), seq, note)?;
    bookmarks.save(&sidecar)?;

    match previous {
        Some(old) => println!("Replaced bookmark on event {} (was: {})", seq, old),
        None => println!("Bookmarked event {}", seq),
    }
    Ok(())
}

/// List bookmarks with the time and a preview of each event.
#[cfg(not(tarpaulin_include))]
pub fn handle_list(log: &str) -> Result<()> {
    let config = Config::load()?;
    let path = resolve_log(log, &config)?;
    let bookmarks = BookmarkSet::load(&BookmarkSet::sidecar_path(&path))?;
    if bookmarks.is_empty() {
        println!("No bookmarks.");
        return Ok(());
    }

    let analyzer = Analyzer::open(&path, AnalysisOptions::default())?;
    for mark in bookmarks.list() {
        match analyzer.trace().event(mark.seq) {
            Some(event) => {
                let preview = ktrace::analysis::text::command_text(&event.payload);
                println!(
                    "{:>6} {:>12} {:<3} {}  | {}",
                    mark.seq,
                    format_offset(event.ts_ns),
                    event.kind,
                    mark.note,
                    truncate_string(&preview, 40)
                );
            }
            // The log was truncated after the bookmark was made.
            None => println!("{:>6} {:>12} {:<3} {}", mark.seq, "?", "?", mark.note),
        }
    }
    Ok(())
}

/// Remove the bookmark on event `seq`.
#[cfg(not(tarpaulin_include))]
pub fn handle_remove(log: &str, seq: u64) -> Result<()> {
    let config = Config::load()?;
    let path = resolve_log(log, &config)?;
    let sidecar = BookmarkSet::sidecar_path(&path);
    let mut bookmarks = BookmarkSet::load(&sidecar)?;
    if bookmarks.remove(seq).is_none() {
        bail!("No bookmark on event {}", seq);
    }
    bookmarks.save(&sidecar)?;
    println!("Removed bookmark on event {}", seq);
    Ok(())
}
