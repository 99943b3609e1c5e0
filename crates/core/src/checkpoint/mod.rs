//! Persisted set of record keys whose items were fully ingested.
//!
//! The producer consults it to skip finished records after a restart; the
//! consumer appends to it after each batch. Membership only ever grows.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::snapshot;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checkpoint serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointFile {
    completed_keys: Vec<String>,
}

/// Completed-set checkpoint.
#[derive(Debug, Default)]
pub struct CompletedSet {
    keys: Mutex<HashSet<String>>,
}

impl CompletedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the key was not yet present.
    pub async fn add(&self, key: impl Into<String>) -> bool {
        self.keys.lock().await.insert(key.into())
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.keys.lock().await.contains(key)
    }

    pub async fn len(&self) -> usize {
        self.keys.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.keys.lock().await.is_empty()
    }

    pub async fn snapshot(&self) -> HashSet<String> {
        self.keys.lock().await.clone()
    }

    /// Write the sorted keys to `path`.
    ///
    /// The set stays locked until the file is in place, so a later save can
    /// never be overwritten by an earlier, smaller snapshot.
    pub async fn save(&self, path: &Path) -> Result<(), CheckpointError> {
        let keys = self.keys.lock().await;
        let mut completed_keys: Vec<String> = keys.iter().cloned().collect();
        completed_keys.sort();
        let file = CheckpointFile { completed_keys };

        let bytes = serde_json::to_vec(&file)?;
        snapshot::write_atomic(path, &bytes).await?;
        drop(keys);
        debug!(
            path = %path.display(),
            keys = file.completed_keys.len(),
            "Saved completed-set checkpoint"
        );
        Ok(())
    }

    /// Read a checkpoint; a missing or corrupt file yields an empty set.
    pub async fn load(path: &Path) -> Self {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No checkpoint, starting empty");
                return Self::new();
            }
        };

        match serde_json::from_slice::<CheckpointFile>(&bytes) {
            Ok(file) => {
                debug!(
                    path = %path.display(),
                    keys = file.completed_keys.len(),
                    "Loaded completed-set checkpoint"
                );
                Self {
                    keys: Mutex::new(file.completed_keys.into_iter().collect()),
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt checkpoint, starting empty");
                Self::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let completed = CompletedSet::new();
        assert!(completed.add("https://eztvx.to/shows/2583/breaking-bad/").await);
        assert!(!completed.add("https://eztvx.to/shows/2583/breaking-bad/").await);
        assert_eq!(completed.len().await, 1);
    }

    #[tokio::test]
    async fn test_snapshot_is_a_copy() {
        let completed = CompletedSet::new();
        completed.add("a").await;
        let snapshot = completed.snapshot().await;
        completed.add("b").await;

        assert_eq!(snapshot.len(), 1);
        assert!(completed.contains("b").await);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("completed.json");

        let completed = CompletedSet::new();
        completed.add("b").await;
        completed.add("a").await;
        completed.save(&path).await.unwrap();

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(raw, r#"{"completed_keys":["a","b"]}"#);

        let loaded = CompletedSet::load(&path).await;
        assert_eq!(loaded.snapshot().await, completed.snapshot().await);
    }

    #[tokio::test]
    async fn test_load_missing_or_corrupt() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("completed.json");

        assert!(CompletedSet::load(&path).await.is_empty().await);

        tokio::fs::write(&path, b"[1, 2").await.unwrap();
        assert!(CompletedSet::load(&path).await.is_empty().await);

        tokio::fs::write(&path, br#"{"other": true}"#).await.unwrap();
        assert!(CompletedSet::load(&path).await.is_empty().await);
    }
}
