use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use winup_core::models::SourceId;

#[derive(Parser, Debug)]
#[command(
    name = "winup",
    about = "Keeps Winget, Chocolatey and Microsoft Store packages up to date",
    version
)]
pub struct Cli {
    /// Configuration file (defaults to the per-machine location)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available updates without installing anything
    Check,

    /// Upgrade every outdated package from each enabled source
    Update {
        /// Only enumerate updates; no upgrade command is run
        #[arg(long)]
        list_only: bool,

        #[arg(long)]
        skip_winget: bool,

        #[arg(long)]
        skip_chocolatey: bool,

        #[arg(long)]
        skip_store: bool,

        /// Write a JSON report of the run to this path
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,

        /// Do not record outcomes in the update history
        #[arg(long)]
        no_history: bool,
    },

    /// Show which package sources are installed on this machine
    Sources,

    /// Show recent upgrade outcomes
    History {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// Reinstall an earlier version of a package
    Rollback {
        /// winget, chocolatey (choco) or store
        #[arg(value_parser = parse_source)]
        source: SourceId,

        package_id: String,

        /// Version to reinstall; defaults to the version before the last recorded upgrade
        #[arg(long)]
        version: Option<String>,
    },
}

fn parse_source(value: &str) -> Result<SourceId, String> {
    value
        .parse::<SourceId>()
        .map_err(|()| format!("unknown source '{value}' (expected winget, chocolatey or store)"))
}
