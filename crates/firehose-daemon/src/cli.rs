//! CLI argument parsing for the firehose daemon.
//!
//! CLI flags override all other config sources.

use clap::{Parser, Subcommand};

use firehose_types::SinkType;

/// Job Firehose
///
/// Streams Nomad job changes to a sink, resuming from a saved checkpoint.
#[derive(Parser, Debug)]
#[command(name = "job-firehose")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides the default job-firehose/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Daemon commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the firehose until interrupted
    Start {
        /// Nomad agent address
        #[arg(long)]
        nomad_addr: Option<String>,

        /// Sink to publish to (stdout, http, memory)
        #[arg(long)]
        sink: Option<SinkType>,

        /// Directory holding checkpoint files
        #[arg(long)]
        checkpoint_dir: Option<String>,

        /// Start from this index instead of the saved checkpoint
        #[arg(long)]
        from_index: Option<u64>,
    },

    /// Inspect or clear the saved checkpoint
    Checkpoint {
        /// Directory holding checkpoint files
        #[arg(long)]
        checkpoint_dir: Option<String>,

        #[command(subcommand)]
        command: CheckpointCommands,
    },
}

/// Checkpoint subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum CheckpointCommands {
    /// Print the saved cursor
    Show,

    /// Delete the saved cursor so the next start begins from zero
    Reset,
}
