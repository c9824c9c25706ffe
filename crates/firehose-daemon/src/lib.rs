//! Firehose daemon library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (start, checkpoint)
//! - `checkpoint_store`: File-backed checkpoint persistence

pub mod checkpoint_store;
pub mod cli;
pub mod commands;

pub use checkpoint_store::{
    run_persister, CheckpointStoreError, FileCheckpointStore, StoredCheckpoint,
};
pub use cli::{CheckpointCommands, Cli, Commands};
pub use commands::{apply_overrides, handle_checkpoint, start_firehose, StartOptions};
