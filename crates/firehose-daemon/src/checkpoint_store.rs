//! File-backed checkpoint persistence.
//!
//! One JSON file per firehose name, `<dir>/<name>.checkpoint.json`:
//!
//! ```json
//! {"name":"jobs","value":42,"updated_at":1760600000000}
//! ```
//!
//! The value is kept as raw JSON so a hand-edited file that no longer
//! holds an integer is reported on restore instead of being parsed away.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use firehose_core::{decode_restore_value, FirehoseError, JobsFirehose};

/// Errors from the checkpoint store.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Restore error: {0}")]
    Restore(#[from] FirehoseError),
}

/// Persisted checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCheckpoint {
    /// Firehose the checkpoint belongs to
    pub name: String,

    /// Last emitted cursor
    pub value: serde_json::Value,

    /// When the checkpoint was written (milliseconds since epoch)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

/// Stores checkpoints as JSON files in a directory.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    /// Open the store, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CheckpointStoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the checkpoint file for `name`.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.checkpoint.json"))
    }

    /// Read the checkpoint for `name`, if one was saved.
    pub fn load(&self, name: &str) -> Result<Option<StoredCheckpoint>, CheckpointStoreError> {
        let path = self.path(name);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Write `value` for `name`.
    ///
    /// The file is written next to its final location and renamed into
    /// place, so readers see either the old or the new checkpoint.
    pub fn save(&self, name: &str, value: u64) -> Result<StoredCheckpoint, CheckpointStoreError> {
        let checkpoint = StoredCheckpoint {
            name: name.to_string(),
            value: serde_json::Value::from(value),
            updated_at: Utc::now(),
        };

        let path = self.path(name);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(&checkpoint)?)?;
        fs::rename(&tmp, &path)?;

        debug!(name, cursor = value, path = ?path, "Saved checkpoint");
        Ok(checkpoint)
    }

    /// Delete the checkpoint for `name`. Returns whether one existed.
    pub fn remove(&self, name: &str) -> Result<bool, CheckpointStoreError> {
        match fs::remove_file(self.path(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Install the saved cursor on `firehose`.
    ///
    /// Returns the restored value, or `None` when nothing was saved and the
    /// firehose starts from zero.
    pub fn restore_into(&self, firehose: &JobsFirehose) -> Result<Option<u64>, CheckpointStoreError> {
        let Some(checkpoint) = self.load(firehose.name())? else {
            info!(name = firehose.name(), "No checkpoint found, starting from zero");
            return Ok(None);
        };

        let value = decode_restore_value(&checkpoint.value)?;
        firehose.set_restore_value(value)?;
        Ok(Some(value))
    }
}

/// Save every checkpoint published on `updates` until `shutdown` fires.
///
/// Returns the last value written. The final checkpoint emitted on stop
/// is saved by the caller once the firehose has returned.
pub async fn run_persister(
    store: FileCheckpointStore,
    name: &'static str,
    mut updates: watch::Receiver<u64>,
    shutdown: CancellationToken,
) -> Option<u64> {
    let mut last_saved = None;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let value = *updates.borrow_and_update();
                if last_saved == Some(value) {
                    continue;
                }
                match store.save(name, value) {
                    Ok(_) => last_saved = Some(value),
                    Err(e) => error!(name, cursor = value, error = %e, "Failed to save checkpoint"),
                }
            }
        }
    }

    last_saved
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::open(dir.path()).unwrap();
        assert!(store.load("jobs").unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::open(dir.path().join("nested")).unwrap();

        store.save("jobs", 42).unwrap();
        let checkpoint = store.load("jobs").unwrap().unwrap();

        assert_eq!(checkpoint.name, "jobs");
        assert_eq!(checkpoint.value, serde_json::json!(42));
        assert!(store.path("jobs").ends_with("jobs.checkpoint.json"));
        assert!(!store.path("jobs").with_extension("json.tmp").exists());
    }

    #[test]
    fn test_save_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::open(dir.path()).unwrap();

        store.save("jobs", 1).unwrap();
        store.save("jobs", 7).unwrap();

        assert_eq!(store.load("jobs").unwrap().unwrap().value, 7);
    }

    #[test]
    fn test_json_format() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::open(dir.path()).unwrap();
        store.save("jobs", 9).unwrap();

        let raw = fs::read_to_string(store.path("jobs")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["name"], "jobs");
        assert_eq!(json["value"], 9);
        assert!(json["updated_at"].is_i64());
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::open(dir.path()).unwrap();

        assert!(!store.remove("jobs").unwrap());
        store.save("jobs", 3).unwrap();
        assert!(store.remove("jobs").unwrap());
        assert!(store.load("jobs").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::open(dir.path()).unwrap();
        fs::write(store.path("jobs"), b"{not json").unwrap();

        assert!(matches!(
            store.load("jobs"),
            Err(CheckpointStoreError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_persister_saves_updates() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::open(dir.path()).unwrap();
        let (tx, rx) = watch::channel(0u64);
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(run_persister(store.clone(), "jobs", rx, shutdown.clone()));

        tx.send_replace(12);
        for _ in 0..100 {
            if store.load("jobs").unwrap().is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        shutdown.cancel();
        assert_eq!(handle.await.unwrap(), Some(12));
        assert_eq!(store.load("jobs").unwrap().unwrap().value, 12);
    }
}
