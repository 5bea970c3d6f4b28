use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{read_json, write_json, CheckpointStore};
use crate::error::{PersistenceError, PersistenceResult};

/// Contents of the progress file: `{completed: [...], failed: [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressLedger {
    #[serde(default, alias = "completed_transitions")]
    pub completed: BTreeSet<String>,
    #[serde(default, alias = "failed_transitions")]
    pub failed: BTreeSet<String>,
}

impl ProgressLedger {
    pub(crate) fn complete(&mut self, key: &str) {
        self.failed.remove(key);
        self.completed.insert(key.to_string());
    }

    pub(crate) fn fail(&mut self, key: &str) {
        if !self.completed.contains(key) {
            self.failed.insert(key.to_string());
        }
    }
}

/// Checkpoint ledger kept in a JSON file, rewritten after every update.
#[derive(Debug)]
pub struct JsonProgressFile {
    path: PathBuf,
    ledger: Mutex<ProgressLedger>,
}

impl JsonProgressFile {
    /// Open a progress file, starting empty when it does not exist yet
    pub async fn open(path: impl AsRef<Path>) -> PersistenceResult<Self> {
        let path = path.as_ref().to_path_buf();

        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|source| PersistenceError::Io {
                path: path.clone(),
                source,
            })?;

        let ledger = if exists {
            let ledger: ProgressLedger = read_json(&path).await?;
            info!(
                path = %path.display(),
                completed = ledger.completed.len(),
                failed = ledger.failed.len(),
                "Loaded progress file"
            );
            ledger
        } else {
            ProgressLedger::default()
        };

        Ok(Self {
            path,
            ledger: Mutex::new(ledger),
        })
    }

    /// Location of the progress file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current ledger
    pub async fn snapshot(&self) -> ProgressLedger {
        self.ledger.lock().await.clone()
    }
}

#[async_trait]
impl CheckpointStore for JsonProgressFile {
    async fn has_completed(&self, key: &str) -> PersistenceResult<bool> {
        Ok(self.ledger.lock().await.completed.contains(key))
    }

    async fn mark_completed(&self, key: &str) -> PersistenceResult<()> {
        let mut ledger = self.ledger.lock().await;
        ledger.complete(key);
        write_json(&self.path, &*ledger).await?;
        debug!(key, "Checkpoint completed");
        Ok(())
    }

    async fn mark_failed(&self, key: &str) -> PersistenceResult<()> {
        let mut ledger = self.ledger.lock().await;
        ledger.fail(key);
        write_json(&self.path, &*ledger).await?;
        debug!(key, "Checkpoint failed");
        Ok(())
    }

    async fn completed_keys(&self) -> PersistenceResult<Vec<String>> {
        Ok(self.ledger.lock().await.completed.iter().cloned().collect())
    }

    async fn failed_keys(&self) -> PersistenceResult<Vec<String>> {
        Ok(self.ledger.lock().await.failed.iter().cloned().collect())
    }
}
