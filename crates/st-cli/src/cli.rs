//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Per-site browsing time tracker.
///
/// Reads browser lifecycle events, accumulates time spent per domain and
/// reports on it.
#[derive(Debug, Parser)]
#[command(name = "st", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Track sessions from JSON lifecycle events on stdin until EOF or Ctrl-C.
    ///
    /// Each line is one event, e.g.
    /// `{"type":"tab_activated","tab":{"id":1,"url":"https://example.com"}}`.
    /// An optional RFC 3339 `at` field replays the event at that time.
    Run,

    /// Show a short summary of stored usage.
    Status,

    /// Show time per domain and per category.
    Report {
        /// Output as JSON.
        #[arg(long)]
        json: bool,

        /// Only show the top N domains.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Remove domains not seen within the retention window.
    Cleanup {
        /// Retention window in days (defaults to `tracking.retention_days`).
        #[arg(long)]
        days: Option<u32>,
    },

    /// Delete stored data, keeping goals, theme, streaks and the API key.
    Reset {
        /// Additional keys to keep.
        #[arg(long = "keep", value_name = "KEY")]
        keep: Vec<String>,

        /// Confirm the reset.
        #[arg(long)]
        yes: bool,
    },

    /// Write a JSON snapshot of usage, metadata and goals.
    Export {
        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fold legacy usage keys into the current format.
    Migrate,

    /// Summarize all recorded browsing, using the configured model when available.
    Digest,
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn reset_accepts_repeated_keep() {
        let cli = Cli::parse_from(["st", "reset", "--keep", "a", "--keep", "b", "--yes"]);
        match cli.command {
            Some(Commands::Reset { keep, yes }) => {
                assert_eq!(keep, vec!["a", "b"]);
                assert!(yes);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn digest_help_describes_cumulative_usage() {
        let command = Cli::command();
        let digest = command.find_subcommand("digest").unwrap();
        let about = digest.get_about().unwrap().to_string();
        assert!(about.starts_with("Summarize all recorded browsing"), "{about}");
        assert!(!about.contains("today"));
    }
}
