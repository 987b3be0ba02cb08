use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(name = "sg")]
#[command(about = "Inspect the semester cache and write locks")]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Context directory overriding `context_dir` from the config
    #[arg(long, global = true, value_name = "DIR")]
    pub context: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the selectable semesters
    Options {
        /// Ask the backend even when options are cached
        #[arg(long)]
        refresh: bool,
        /// Role to filter the "all semesters" entry for
        #[arg(long)]
        role: Option<String>,
    },
    /// Print the semester the backend reports as current
    Current,
    /// Show the lifecycle status of a semester
    Status {
        #[arg(value_name = "KEY")]
        key: Option<String>,
        #[arg(long)]
        refresh: bool,
    },
    /// Tell whether a semester still accepts changes
    Writable {
        #[arg(value_name = "KEY")]
        key: Option<String>,
    },
    /// Set the selected semester, or clear it when no key is given
    Select {
        #[arg(value_name = "KEY")]
        key: Option<String>,
    },
    /// Drop cached data and tell the other contexts
    Invalidate {
        #[arg(value_enum, default_value_t = InvalidateTarget::All)]
        target: InvalidateTarget,
    },
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, ValueEnum, Clone, Copy, PartialEq, Eq)]
pub enum InvalidateTarget {
    Options,
    Status,
    All,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn invalidate_defaults_to_everything() {
        let cli = Cli::try_parse_from(["sg", "invalidate"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Invalidate {
                target: InvalidateTarget::All
            }
        ));
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli =
            Cli::try_parse_from(["sg", "status", "1-2025", "--context", "/tmp/ctx"]).unwrap();
        assert_eq!(cli.context, Some(PathBuf::from("/tmp/ctx")));
        assert!(matches!(
            cli.command,
            Commands::Status { key: Some(ref key), refresh: false } if key == "1-2025"
        ));
    }
}
