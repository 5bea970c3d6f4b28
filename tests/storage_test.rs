//! Integration tests for the checkpoint ledgers
//!
//! Covers the JSON progress file and the SQLite store, both in-memory and
//! on disk, through the `CheckpointStore` trait.

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use world_bench_curator::config::{CheckpointBackend, CheckpointConfig};
use world_bench_curator::error::PersistenceError;
use world_bench_curator::storage::{
    edge_key, open_checkpoint_store, CheckpointStore, JsonProgressFile, ProgressLedger,
    SqliteCheckpointStore,
};

/// Create an in-memory SQLite store for testing
async fn create_test_store() -> SqliteCheckpointStore {
    SqliteCheckpointStore::new_in_memory()
        .await
        .expect("Failed to create in-memory checkpoint store")
}

#[cfg(test)]
mod json_progress_tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonProgressFile::open(dir.path().join("progress.json"))
            .await
            .unwrap();

        assert!(store.completed_keys().await.unwrap().is_empty());
        assert!(!store.has_completed("s0").await.unwrap());
    }

    #[tokio::test]
    async fn test_progress_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("progress.json");

        {
            let store = JsonProgressFile::open(&path).await.unwrap();
            store.mark_completed("s0").await.unwrap();
            store.mark_completed(&edge_key("s0", "s1")).await.unwrap();
            store.mark_failed("s2").await.unwrap();
        }

        let reopened = JsonProgressFile::open(&path).await.unwrap();
        assert!(reopened.has_completed("s0").await.unwrap());
        assert!(reopened.has_completed("s0_to_s1").await.unwrap());
        assert!(!reopened.has_completed("s2").await.unwrap());
        assert_eq!(reopened.failed_keys().await.unwrap(), vec!["s2".to_string()]);
    }

    #[tokio::test]
    async fn test_file_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.json");
        let store = JsonProgressFile::open(&path).await.unwrap();
        store.mark_completed("s1").await.unwrap();
        store.mark_completed("s0").await.unwrap();
        store.mark_failed("s3").await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, json!({"completed": ["s0", "s1"], "failed": ["s3"]}));
    }

    #[tokio::test]
    async fn test_legacy_field_names_are_accepted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(
            &path,
            r#"{"completed_transitions": ["s0_to_s1"], "failed_transitions": ["s1_to_s2"]}"#,
        )
        .unwrap();

        let store = JsonProgressFile::open(&path).await.unwrap();
        assert_eq!(
            store.snapshot().await,
            ProgressLedger {
                completed: ["s0_to_s1".to_string()].into(),
                failed: ["s1_to_s2".to_string()].into(),
            }
        );
    }

    #[tokio::test]
    async fn test_failure_after_completion_is_ignored() {
        let dir = TempDir::new().unwrap();
        let store = JsonProgressFile::open(dir.path().join("p.json"))
            .await
            .unwrap();

        store.mark_completed("s4").await.unwrap();
        store.mark_failed("s4").await.unwrap();

        assert!(store.has_completed("s4").await.unwrap());
        assert!(store.failed_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(JsonProgressFile::open(&path).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_location_is_an_error_not_an_empty_ledger() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let result = JsonProgressFile::open(blocker.join("progress.json")).await;
        assert!(matches!(result, Err(PersistenceError::Io { .. })));
    }
}

#[cfg(test)]
mod sqlite_tests {
    use super::*;

    #[tokio::test]
    async fn test_mark_and_query() {
        let store = create_test_store().await;

        store.mark_completed("s0").await.unwrap();
        store.mark_failed("s1").await.unwrap();

        assert!(store.has_completed("s0").await.unwrap());
        assert!(!store.has_completed("s1").await.unwrap());
        assert_eq!(store.completed_keys().await.unwrap(), vec!["s0".to_string()]);
        assert_eq!(store.failed_keys().await.unwrap(), vec!["s1".to_string()]);
    }

    #[tokio::test]
    async fn test_retry_success_clears_failure() {
        let store = create_test_store().await;

        store.mark_failed("s0_to_s1").await.unwrap();
        store.mark_completed("s0_to_s1").await.unwrap();

        assert!(store.has_completed("s0_to_s1").await.unwrap());
        assert!(store.failed_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_completed_is_not_downgraded() {
        let store = create_test_store().await;

        store.mark_completed("s2").await.unwrap();
        store.mark_failed("s2").await.unwrap();

        assert!(store.has_completed("s2").await.unwrap());
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("progress.db");

        {
            let store = SqliteCheckpointStore::new(&path).await.unwrap();
            store.mark_completed("s0").await.unwrap();
        }

        let reopened = SqliteCheckpointStore::new(&path).await.unwrap();
        assert!(reopened.has_completed("s0").await.unwrap());
    }
}

#[cfg(test)]
mod factory_tests {
    use super::*;

    #[tokio::test]
    async fn test_open_configured_backends() {
        let dir = TempDir::new().unwrap();

        for (backend, file) in [
            (CheckpointBackend::Json, "progress.json"),
            (CheckpointBackend::Sqlite, "progress.db"),
        ] {
            let config = CheckpointConfig {
                backend,
                path: dir.path().join(file),
            };
            let store: Arc<dyn CheckpointStore> = open_checkpoint_store(&config).await.unwrap();
            store.mark_completed("s0").await.unwrap();
            assert!(store.has_completed("s0").await.unwrap());
        }
    }
}
