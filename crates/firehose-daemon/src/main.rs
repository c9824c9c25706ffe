//! Job Firehose Daemon
//!
//! Streams Nomad job changes to a sink.
//!
//! # Usage
//!
//! ```bash
//! job-firehose start [--nomad-addr ADDR] [--sink TYPE] [--checkpoint-dir DIR] [--from-index N]
//! job-firehose checkpoint show
//! job-firehose checkpoint reset
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults (`NOMAD_ADDR`, `NOMAD_TOKEN`, ... are honoured)
//! 2. Config file (~/.config/job-firehose/config.toml)
//! 3. Environment variables (FIREHOSE_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use firehose_daemon::{handle_checkpoint, start_firehose, Cli, Commands, StartOptions};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            nomad_addr,
            sink,
            checkpoint_dir,
            from_index,
        } => {
            let options = StartOptions {
                nomad_addr,
                sink,
                checkpoint_dir,
                from_index,
            };
            start_firehose(cli.config.as_deref(), options, cli.log_level.as_deref()).await?;
        }
        Commands::Checkpoint {
            checkpoint_dir,
            command,
        } => {
            handle_checkpoint(cli.config.as_deref(), checkpoint_dir, command)?;
        }
    }

    Ok(())
}
