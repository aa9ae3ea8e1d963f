//! ktrace - CLI entry point

mod commands;

use anyhow::Result;
use clap::Parser;

use ktrace::cli::{BookmarkCommands, Cli, Commands, ConfigCommands};
use ktrace::{logging, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Diagnostics are best effort; a broken config is reported by the command.
    if let Ok(config) = Config::load() {
        if let Err(e) = logging::init(&config, cli.verbose) {
            eprintln!("Warning: diagnostics logging disabled: {:#}", e);
        }
    }

    match cli.command {
        Commands::Record {
            shell,
            name,
            no_rename,
            args,
        } => commands::record::handle(shell.as_deref(), name.as_deref(), no_rename, &args),
        Commands::List => commands::list::handle(),
        Commands::Show { log, raw } => commands::show::handle_show(&log, raw),
        Commands::Clean { log } => commands::show::handle_clean(&log),
        Commands::Search {
            log,
            pattern,
            case_sensitive,
            regex,
            raw,
            json,
        } => commands::analyze::handle_search(&log, &pattern, case_sensitive, regex, raw, json),
        Commands::Segments { log } => commands::analyze::handle_segments(&log),
        Commands::Stats { log, json } => commands::analyze::handle_stats(&log, json),
        Commands::Freq { log, top } => commands::analyze::handle_freq(&log, top),
        Commands::Ips { log } => commands::analyze::handle_ips(&log),
        Commands::Bookmark(cmd) => match cmd {
            BookmarkCommands::Add { log, seq, note } => {
                commands::bookmark::handle_add(&log, seq, &note)
            }
            BookmarkCommands::List { log } => commands::bookmark::handle_list(&log),
            BookmarkCommands::Remove { log, seq } => commands::bookmark::handle_remove(&log, seq),
        },
        Commands::Export {
            log,
            kind,
            from,
            to,
            bookmarked,
            output,
        } => commands::export::handle_export(
            &log,
            kind.map(Into::into),
            from,
            to,
            bookmarked,
            output.as_deref(),
        ),
        Commands::Import { input, output } => commands::export::handle_import(&input, &output),
        Commands::Verify { log } => {
            if !commands::verify::handle(&log)? {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => commands::config::handle_show(),
            ConfigCommands::Path => commands::config::handle_path(),
        },
        Commands::Completions { shell } => commands::completions::handle::<Cli>(shell),
    }
}
