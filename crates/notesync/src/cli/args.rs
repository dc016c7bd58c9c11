//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "notesync", version, about = "Replay scripted editing sessions against the notesync engine")]
pub struct Cli {
    /// Engine configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long, global = true, env = "NOTESYNC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a replay script and print the resulting editor state
    Replay {
        /// Path to the script (TOML)
        script: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective engine configuration
    Config,
}
