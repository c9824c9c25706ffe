//! Command implementations for the firehose daemon.
//!
//! Handles:
//! - start: load config, restore the checkpoint, run the firehose
//! - checkpoint show/reset: inspect or clear the saved cursor

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use firehose_core::{FirehoseConfig, JobsFirehose, FIREHOSE_NAME};
use firehose_nomad::{NomadClient, NomadConfig};
use firehose_sinks::build_sink;
use firehose_types::{Settings, SinkType};

use crate::checkpoint_store::{run_persister, FileCheckpointStore};
use crate::cli::CheckpointCommands;

/// CLI overrides for `start`.
#[derive(Debug, Default, Clone)]
pub struct StartOptions {
    pub nomad_addr: Option<String>,
    pub sink: Option<SinkType>,
    pub checkpoint_dir: Option<String>,
    pub from_index: Option<u64>,
}

/// Apply CLI overrides on top of loaded settings and re-validate.
pub fn apply_overrides(
    settings: &mut Settings,
    options: &StartOptions,
    log_level: Option<&str>,
) -> Result<()> {
    if let Some(addr) = &options.nomad_addr {
        settings.nomad.address = addr.clone();
    }
    if let Some(sink) = options.sink {
        settings.sink.sink_type = sink;
    }
    if let Some(dir) = &options.checkpoint_dir {
        settings.checkpoint_dir = dir.clone();
    }
    if let Some(level) = log_level {
        settings.log_level = level.to_string();
    }
    settings.validate().context("Invalid configuration")?;
    Ok(())
}

fn init_tracing(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Start the firehose.
///
/// 1. Load configuration (defaults -> file -> env -> CLI)
/// 2. Restore the cursor from the checkpoint store (or `--from-index`)
/// 3. Run until SIGINT/SIGTERM, persisting checkpoints as they arrive
/// 4. Save the final checkpoint
pub async fn start_firehose(
    config_path: Option<&str>,
    options: StartOptions,
    log_level_override: Option<&str>,
) -> Result<()> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    apply_overrides(&mut settings, &options, log_level_override)?;

    init_tracing(&settings.log_level)?;

    info!("Job firehose starting...");
    info!("Configuration:");
    info!("  Nomad address: {}", settings.nomad.address);
    info!("  Sink: {}", settings.sink.sink_type);
    info!("  Dispatch mode: {:?}", settings.watcher.dispatch_mode);
    info!("  Checkpoint dir: {}", settings.checkpoint_dir);

    let store = FileCheckpointStore::open(settings.expanded_checkpoint_dir())
        .context("Failed to open checkpoint directory")?;

    let client = NomadClient::new(NomadConfig::from(&settings.nomad))
        .context("Failed to create Nomad client")?;
    let sink = build_sink(&settings.sink).context("Failed to create sink")?;
    let firehose = Arc::new(JobsFirehose::new(
        Arc::new(client),
        sink,
        FirehoseConfig::from(&settings.watcher),
    ));

    match options.from_index {
        Some(index) => {
            warn!(cursor = index, "Ignoring saved checkpoint, starting from --from-index");
            firehose.set_restore_value(index)?;
        }
        None => {
            store
                .restore_into(&firehose)
                .context("Failed to restore checkpoint")?;
        }
    }

    let persister_shutdown = CancellationToken::new();
    let persister = tokio::spawn(run_persister(
        store.clone(),
        firehose.name(),
        firehose.update_channel(),
        persister_shutdown.clone(),
    ));

    let signal_firehose = Arc::clone(&firehose);
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        signal_firehose.stop().await;
    });

    // Returns once the sink has drained
    firehose.start().await?;
    if let Err(e) = signal_task.await {
        error!(error = %e, "Shutdown task failed");
    }

    persister_shutdown.cancel();
    if let Err(e) = persister.await {
        error!(error = %e, "Checkpoint persister failed");
    }

    let final_cursor = *firehose.update_channel().borrow();
    store
        .save(firehose.name(), final_cursor)
        .context("Failed to save final checkpoint")?;
    info!(cursor = final_cursor, "Saved final checkpoint");

    Ok(())
}

/// Resolve when SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

/// Handle `checkpoint show|reset`.
pub fn handle_checkpoint(
    config_path: Option<&str>,
    checkpoint_dir: Option<String>,
    command: CheckpointCommands,
) -> Result<()> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(dir) = checkpoint_dir {
        settings.checkpoint_dir = dir;
    }

    let store = FileCheckpointStore::open(settings.expanded_checkpoint_dir())
        .context("Failed to open checkpoint directory")?;

    match command {
        CheckpointCommands::Show => match store.load(FIREHOSE_NAME)? {
            Some(checkpoint) => {
                println!("Checkpoint: {}", checkpoint.name);
                println!("  Cursor: {}", checkpoint.value);
                println!("  Updated: {}", checkpoint.updated_at.to_rfc3339());
                println!("  File: {}", store.path(FIREHOSE_NAME).display());
            }
            None => {
                println!("No checkpoint saved in {}", store.dir().display());
            }
        },
        CheckpointCommands::Reset => {
            if store.remove(FIREHOSE_NAME)? {
                println!("Removed checkpoint for {}", FIREHOSE_NAME);
            } else {
                println!("No checkpoint to remove");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use firehose_types::HttpSinkSettings;

    #[test]
    fn test_apply_overrides() {
        let mut settings = Settings::default();
        let options = StartOptions {
            nomad_addr: Some("http://nomad:4646".to_string()),
            sink: Some(SinkType::Memory),
            checkpoint_dir: Some("/var/lib/firehose".to_string()),
            from_index: Some(3),
        };

        apply_overrides(&mut settings, &options, Some("debug")).unwrap();

        assert_eq!(settings.nomad.address, "http://nomad:4646");
        assert_eq!(settings.sink.sink_type, SinkType::Memory);
        assert_eq!(settings.checkpoint_dir, "/var/lib/firehose");
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn test_http_sink_override_needs_url() {
        let mut settings = Settings::default();
        let options = StartOptions {
            sink: Some(SinkType::Http),
            ..Default::default()
        };
        assert!(apply_overrides(&mut settings, &options, None).is_err());

        settings.sink.http = HttpSinkSettings {
            url: Some("http://collector/events".to_string()),
            ..Default::default()
        };
        assert!(apply_overrides(&mut settings, &options, None).is_ok());
    }

    #[test]
    fn test_checkpoint_show_and_reset() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().to_string_lossy().to_string();

        let store = FileCheckpointStore::open(dir.path()).unwrap();
        store.save(FIREHOSE_NAME, 17).unwrap();

        handle_checkpoint(None, Some(path.clone()), CheckpointCommands::Show).unwrap();
        handle_checkpoint(None, Some(path), CheckpointCommands::Reset).unwrap();

        assert!(store.load(FIREHOSE_NAME).unwrap().is_none());
    }
}
