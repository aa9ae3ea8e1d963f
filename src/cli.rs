//! CLI definitions for ktrace
//!
//! Kept apart from main.rs so xtask can render man pages from the same
//! definitions.

use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell as CompletionShell;

use crate::tracelog::EventKind;

/// Version shown by `--version`; dev builds carry the git commit.
#[cfg(not(feature = "release"))]
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("VERGEN_GIT_SHA"), ")");
#[cfg(feature = "release")]
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Help output colors.
pub fn build_cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Cyan.on_default())
        .placeholder(AnsiColor::White.on_default())
        .valid(AnsiColor::White.on_default())
        .invalid(AnsiColor::Red.on_default())
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
}

#[derive(Parser)]
#[command(name = "ktrace")]
#[command(about = "Record interactive terminal sessions and analyse the captured logs")]
#[command(
    long_about = "ktrace - record interactive shell sessions through a pseudo-terminal.

Everything typed and everything printed is captured as timestamped events in
an append-only log under ~/.kali-logs/. The recorded session behaves exactly
like the shell it wraps. Logs can afterwards be searched, grouped into
command segments, summarised, bookmarked and exported.

QUICK START:
    ktrace record                       Record a session of your login shell
    ktrace list                         List recorded sessions
    ktrace search latest error          Search the newest session
    ktrace stats latest                 Duration, line counts, top commands

A <LOG> argument is a path, a name in the log directory (with or without
the .ktr extension) or 'latest'."
)]
#[command(version = VERSION)]
#[command(styles = build_cli_styles())]
pub struct Cli {
    /// Log debug diagnostics to the ktrace log file
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Event kind filter for exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Keystrokes sent to the shell
    In,
    /// Bytes printed by the shell
    Out,
}

impl From<KindArg> for EventKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::In => EventKind::Input,
            KindArg::Out => EventKind::Output,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record an interactive shell session
    #[command(long_about = "Start an interactive shell inside a pseudo-terminal and record it.

The log is written to ~/.kali-logs/<timestamp>.ktr while you work. Exit the
shell (exit or Ctrl+D) to stop recording. When the session ends you can
give the log a name; press Enter to keep the timestamp.

EXAMPLES:
    ktrace record                        Record $SHELL (or /bin/bash)
    ktrace record --shell /bin/zsh       Record a specific shell
    ktrace record --name recon-box1      Name the log up front
    ktrace record -- -l                  Pass -l to the shell")]
    Record {
        /// Shell to run instead of the configured one
        #[arg(long, short)]
        shell: Option<String>,
        /// Log name (skips the rename prompt)
        #[arg(long, short)]
        name: Option<String>,
        /// Never prompt for a name
        #[arg(long)]
        no_rename: bool,
        /// Arguments passed to the shell (after --)
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// List recorded sessions
    #[command(long_about = "List session logs in the log directory, newest first.

EXAMPLE:
    ktrace list")]
    List,

    /// Print a log's events
    #[command(long_about = "Print every event of a log with its sequence number, time offset
and kind. Payloads are shown as plain text with escape sequences removed
unless --raw is given.

EXAMPLES:
    ktrace show latest
    ktrace show 2025-01-10_14-03-22 --raw")]
    Show {
        /// Log to show
        log: String,
        /// Print payloads as captured (escaped control bytes)
        #[arg(long)]
        raw: bool,
    },

    /// Print the reconstructed terminal output as clean lines
    #[command(long_about = "Rebuild the terminal output line by line, applying carriage
returns, backspaces and line erases, and print each line with its
wall-clock time. Full-screen programs are summarised with markers.

EXAMPLE:
    ktrace clean latest > session.txt")]
    Clean {
        /// Log to render
        log: String,
    },

    /// Search event payloads
    #[command(long_about = "Find events whose text matches a pattern.

Matching is case-insensitive and literal by default. Each hit reports the
event, the matching lines and the command segment it belongs to.

EXAMPLES:
    ktrace search latest password
    ktrace search latest 'Err(or)?' --regex --case-sensitive
    ktrace search latest nmap --json")]
    Search {
        /// Log to search
        log: String,
        /// Text or regular expression to look for
        pattern: String,
        /// Match case exactly
        #[arg(long, short)]
        case_sensitive: bool,
        /// Treat the pattern as a regular expression
        #[arg(long, short = 'e')]
        regex: bool,
        /// Report events without command segments
        #[arg(long)]
        raw: bool,
        /// Print hits as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Group a log into command segments
    #[command(long_about = "Split the log at every input event and print each segment: the
command that opened it, its duration and its output events.

EXAMPLE:
    ktrace segments latest")]
    Segments {
        /// Log to segment
        log: String,
    },

    /// Show session statistics
    #[command(long_about = "Summarise a session: duration, event and line counts, number of
command segments, most frequent commands and IP addresses seen.

EXAMPLES:
    ktrace stats latest
    ktrace stats latest --json")]
    Stats {
        /// Log to summarise
        log: String,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Most frequently entered commands
    #[command(long_about = "Count the programs run in a session (the first word of each input event,
escape sequences removed) and print the most frequent ones.

EXAMPLE:
    ktrace freq latest -n 5")]
    Freq {
        /// Log to analyse
        log: String,
        /// How many entries to print (default: [analysis].top_n)
        #[arg(long, short = 'n')]
        top: Option<usize>,
    },

    /// IP addresses appearing in the output
    #[command(long_about = "Print every IPv4 and IPv6 address found in the shell's output, in
order of first appearance.

EXAMPLE:
    ktrace ips latest")]
    Ips {
        /// Log to scan
        log: String,
    },

    /// Manage bookmarks on events
    #[command(subcommand)]
    Bookmark(BookmarkCommands),

    /// Export events as JSON lines
    #[command(long_about = "Write selected events as JSON lines, one object per event.

Text payloads are exported as strings, anything else as base64. Bookmark
notes are attached to the events they mark.

EXAMPLES:
    ktrace export latest -o session.jsonl
    ktrace export latest --kind in --from 10 --to 200
    ktrace export latest --bookmarked")]
    Export {
        /// Log to export
        log: String,
        /// Only events of this kind
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
        /// First sequence number to include
        #[arg(long)]
        from: Option<u64>,
        /// Last sequence number to include
        #[arg(long)]
        to: Option<u64>,
        /// Only bookmarked events
        #[arg(long)]
        bookmarked: bool,
        /// Output file (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Rebuild a log from a JSON-lines export
    #[command(long_about = "Read a JSON-lines export and write its events to a new session log.

EXAMPLE:
    ktrace import session.jsonl restored.ktr")]
    Import {
        /// JSON-lines file produced by `ktrace export`
        input: PathBuf,
        /// Log file to create
        output: PathBuf,
    },

    /// Check a log for truncation and corruption
    #[command(long_about = "Read a log end to end and report how many records it holds,
whether the session closed cleanly, trailing bytes of an interrupted
write, and the location of any corrupt record.

Exits with status 1 when the log is corrupt.

EXAMPLE:
    ktrace verify latest")]
    Verify {
        /// Log to check
        log: String,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completions
    #[command(long_about = "Print a completion script for the given shell.

EXAMPLES:
    ktrace completions bash > ~/.local/share/bash-completion/completions/ktrace
    ktrace completions zsh > ~/.zfunc/_ktrace")]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand)]
pub enum BookmarkCommands {
    /// Attach a note to an event
    #[command(long_about = "Bookmark an event by sequence number. Bookmarks are kept in
<log>.bookmarks.json next to the log. Bookmarking an event again replaces
its note.

EXAMPLE:
    ktrace bookmark add latest 42 'root shell obtained'")]
    Add {
        /// Log the event belongs to
        log: String,
        /// Sequence number of the event
        seq: u64,
        /// Note text
        note: String,
    },
    /// List bookmarks of a log
    List {
        /// Log to list bookmarks for
        log: String,
    },
    /// Remove a bookmark
    Remove {
        /// Log the bookmark belongs to
        log: String,
        /// Sequence number of the bookmarked event
        seq: u64,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    #[command(long_about = "Print the effective configuration as TOML.

Config file location: ~/.config/ktrace/config.toml

EXAMPLE:
    ktrace config show")]
    Show,
    /// Print the configuration file path
    Path,
}
