//! Command-line interface definitions for focusd.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use logging::LogArgs;

/// Command-line interface for the `focusd` binary.
#[derive(Parser, Debug)]
#[command(
    name = "focusd",
    about = "Report focused applications and their active browser tab",
    version
)]
pub struct Cli {
    /// Logging controls
    #[command(flatten)]
    pub log: LogArgs,

    /// Optional path to the config file (defaults to ~/.focusd/config.ron)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Override the coalescing delay in milliseconds
    #[arg(long, value_name = "MS", global = true)]
    pub coalesce_ms: Option<u64>,

    /// Command to run; defaults to `watch`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Observe focus changes and print each enriched event as a JSON line.
    Watch,
    /// Resolve the active tab URL of a browser once and print it.
    Resolve {
        /// Application identifier, e.g. com.google.Chrome
        app_id: String,
    },
    /// Load and validate the configuration then exit.
    Check {
        /// Dump the effective configuration as RON to stdout
        #[arg(long)]
        dump: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_watch() {
        let cli = Cli::try_parse_from(["focusd"]).unwrap();
        assert_eq!(cli.command, None);
        assert!(cli.config.is_none());
    }

    #[test]
    fn parses_resolve_with_globals() {
        let cli = Cli::try_parse_from([
            "focusd",
            "resolve",
            "com.apple.Safari",
            "--coalesce-ms",
            "50",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Resolve {
                app_id: "com.apple.Safari".into()
            })
        );
        assert_eq!(cli.coalesce_ms, Some(50));
    }

    #[test]
    fn log_flags_conflict() {
        assert!(Cli::try_parse_from(["focusd", "--trace", "--debug"]).is_err());
        let cli = Cli::try_parse_from(["focusd", "--log-level", "warn", "check", "--dump"]).unwrap();
        assert_eq!(cli.log.log_level.as_deref(), Some("warn"));
        assert_eq!(cli.command, Some(Command::Check { dump: true }));
    }
}
