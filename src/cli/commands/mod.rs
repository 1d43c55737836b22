use crate::sweeper::CleanMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `runsweep` - retention agent for acquired run data.
#[derive(Parser, Debug)]
#[command(name = "runsweep")]
#[command(version)]
#[command(
    about = "Deletes run data copies that are safe to lose, one host at a time.",
    long_about = None
)]
pub struct Cli {
    /// Actually delete (default is a dry-run that only logs)
    #[arg(long, global = true)]
    pub execute: bool,

    /// Ask before every deletion
    #[arg(long, global = true)]
    pub ask_confirm: bool,

    /// Act as this host instead of the configured identity
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Config file to use instead of ~/.runsweep/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Clean the copies of a single run on this host
    Run {
        /// Run number
        #[arg(short, long)]
        number: u32,

        /// Also delete the shared-tier copy (designated host only)
        #[arg(long)]
        delete_live: bool,

        /// Skip the raw-data preservation check for this run
        #[arg(long)]
        force: bool,
    },

    /// Run a named cleanup mode
    Clean {
        #[arg(value_enum)]
        mode: CleanMode,

        /// Bypass the preservation check (abandoned-run cleanup only)
        #[arg(long)]
        force: bool,

        /// Repeat forever with a nap between passes
        #[arg(long)]
        continuous: bool,
    },

    /// Load run records from a JSON array into the metadata store
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },

    /// Print the active and deleted copies of a run
    Show {
        /// Run number
        #[arg(short, long)]
        number: u32,
    },
}
