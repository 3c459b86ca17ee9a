//! CLI argument definitions using clap
//!
//! Commands:
//! - ember-restore start <file>
//! - ember-restore status [--count N] [--interval-ms MS]
//! - ember-restore finalize

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Remote control for the engine's online-restore subsystem.
#[derive(Parser, Debug)]
#[command(name = "ember-restore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Server to talk to.
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Management port.
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Optional JSON config file with connection defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ask the server to restore from an incremental backup file
    Start {
        /// Backup file; resolved to an absolute path before sending
        file: PathBuf,
    },

    /// Poll the restore stat group
    Status {
        /// How many times to poll
        #[arg(long)]
        count: Option<u64>,

        /// Delay between polls in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Tell the server the restore cycle is finished
    Finalize,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
