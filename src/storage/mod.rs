//! Checkpoint ledger and JSON file helpers.
//!
//! The media traversal engine records each finished unit of work in a
//! [`CheckpointStore`] so an interrupted run can resume without re-rendering.
//! Two backends ship: a JSON progress file and a SQLite table.

mod json;
mod sqlite;

pub use json::{JsonProgressFile, ProgressLedger};
pub use sqlite::SqliteCheckpointStore;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::{CheckpointBackend, CheckpointConfig};
use crate::error::{PersistenceError, PersistenceResult};

/// Key of an image node: the bare state id.
pub fn node_key(state_id: &str) -> String {
    state_id.to_string()
}

/// Key of a video edge: `{start}_to_{end}`.
pub fn edge_key(start_state_id: &str, end_state_id: &str) -> String {
    format!("{}_to_{}", start_state_id, end_state_id)
}

/// Resumable-progress port used by the traversal engine.
///
/// Single writer; implementations persist after every call to
/// `mark_completed` or `mark_failed`.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Whether the unit was completed by this or an earlier run
    async fn has_completed(&self, key: &str) -> PersistenceResult<bool>;

    /// Record a completed unit. Clears any earlier failure for the key.
    async fn mark_completed(&self, key: &str) -> PersistenceResult<()>;

    /// Record a failed unit
    async fn mark_failed(&self, key: &str) -> PersistenceResult<()>;

    /// All completed keys, sorted
    async fn completed_keys(&self) -> PersistenceResult<Vec<String>>;

    /// All keys whose last attempt failed, sorted
    async fn failed_keys(&self) -> PersistenceResult<Vec<String>>;
}

/// In-memory ledger for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    ledger: Mutex<ProgressLedger>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from keys completed by an earlier run
    pub fn with_completed<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ledger: Mutex::new(ProgressLedger {
                completed: keys.into_iter().map(Into::into).collect(),
                failed: BTreeSet::new(),
            }),
        }
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn has_completed(&self, key: &str) -> PersistenceResult<bool> {
        Ok(self.ledger.lock().await.completed.contains(key))
    }

    async fn mark_completed(&self, key: &str) -> PersistenceResult<()> {
        self.ledger.lock().await.complete(key);
        Ok(())
    }

    async fn mark_failed(&self, key: &str) -> PersistenceResult<()> {
        self.ledger.lock().await.fail(key);
        Ok(())
    }

    async fn completed_keys(&self) -> PersistenceResult<Vec<String>> {
        Ok(self.ledger.lock().await.completed.iter().cloned().collect())
    }

    async fn failed_keys(&self) -> PersistenceResult<Vec<String>> {
        Ok(self.ledger.lock().await.failed.iter().cloned().collect())
    }
}

/// Open the configured checkpoint backend
pub async fn open_checkpoint_store(
    config: &CheckpointConfig,
) -> PersistenceResult<Arc<dyn CheckpointStore>> {
    Ok(match config.backend {
        CheckpointBackend::Json => Arc::new(JsonProgressFile::open(&config.path).await?),
        CheckpointBackend::Sqlite => Arc::new(SqliteCheckpointStore::new(&config.path).await?),
    })
}

/// Read and parse a JSON document
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> PersistenceResult<T> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a pretty-printed JSON document, creating parent directories.
///
/// Writes go to a sibling temp file first and are renamed into place.
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> PersistenceResult<()> {
    let io_err = |source: std::io::Error| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let body = serde_json::to_vec_pretty(value)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    tokio::fs::write(&tmp, body).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
    Ok(())
}
