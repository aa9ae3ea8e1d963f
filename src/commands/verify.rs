//! Verify command handler

use anyhow::Result;

use ktrace::tracelog::integrity::diagnose;
use ktrace::Config;

use super::resolve_log;

/// Diagnose a log. Returns whether it is free of corruption, so main can
/// set the exit status.
#[cfg(not(tarpaulin_include))]
pub fn handle(log: &str) -> Result<bool> {
    let config = Config::load()?;
    let path = resolve_log(log, &config)?;
    let diagnosis = diagnose(&path)?;

    println!("{}: {}", path.display(), diagnosis.summary());
    if diagnosis.is_clean() {
        println!("OK");
    }
    Ok(diagnosis.corruption.is_none())
}
