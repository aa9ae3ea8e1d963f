//! List command handler

use anyhow::Result;

use ktrace::{Config, StorageManager};

use super::truncate_string;

/// List session logs, newest first, with age and size.
#[cfg(not(tarpaulin_include))]
pub fn handle() -> Result<()> {
    let config = Config::load()?;
    let storage = StorageManager::new(config);
    let mut sessions = storage.list_sessions()?;

    if sessions.is_empty() {
        println!("No sessions found in {}.", storage.storage_dir().display());
        return Ok(());
    }

    sessions.reverse();

    let stats = storage.get_stats()?;
    println!("{}", stats.summary());
    println!();

    println!("  #  |  Age  | DateTime         | Size       | Filename");
    println!("-----+-------+------------------+------------+---------------------------");
    for (i, session) in sessions.iter().enumerate() {
        println!(
            "{:>3}  | {:>5} | {} | {:>10} | {}",
            i + 1,
            session.format_age(),
            session.modified.format("%Y-%m-%d %H:%M"),
            session.size_human(),
            truncate_string(&session.filename, 40)
        );
    }

    Ok(())
}
