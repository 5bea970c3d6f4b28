use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use super::CheckpointStore;
use crate::error::{PersistenceError, PersistenceResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const STATUS_COMPLETED: &str = "completed";
const STATUS_FAILED: &str = "failed";

/// SQLite-backed checkpoint ledger
#[derive(Clone)]
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    /// Open (or create) a checkpoint database at `path`
    pub async fn new(path: &Path) -> PersistenceResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PersistenceError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", path.display());
        Self::connect(&database_url, 5).await
    }

    /// In-memory database, used by tests
    pub async fn new_in_memory() -> PersistenceResult<Self> {
        // A single connection keeps every query on the same in-memory database.
        Self::connect("sqlite::memory:", 1).await
    }

    async fn connect(database_url: &str, max_connections: u32) -> PersistenceResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| PersistenceError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| PersistenceError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> PersistenceResult<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| PersistenceError::Migration {
                message: format!("Failed to run migrations: {}", e),
            })?;

        info!("Checkpoint database ready");
        Ok(())
    }

    async fn upsert(&self, key: &str, status: &str) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO render_progress (key, status, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET status = excluded.status, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(status)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn keys_with_status(&self, status: &str) -> PersistenceResult<Vec<String>> {
        let keys: Vec<(String,)> =
            sqlx::query_as("SELECT key FROM render_progress WHERE status = ? ORDER BY key")
                .bind(status)
                .fetch_all(&self.pool)
                .await?;
        Ok(keys.into_iter().map(|(k,)| k).collect())
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn has_completed(&self, key: &str) -> PersistenceResult<bool> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT key FROM render_progress WHERE key = ? AND status = ?",
        )
        .bind(key)
        .bind(STATUS_COMPLETED)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn mark_completed(&self, key: &str) -> PersistenceResult<()> {
        self.upsert(key, STATUS_COMPLETED).await
    }

    async fn mark_failed(&self, key: &str) -> PersistenceResult<()> {
        // A unit completed earlier stays completed.
        if self.has_completed(key).await? {
            return Ok(());
        }
        self.upsert(key, STATUS_FAILED).await
    }

    async fn completed_keys(&self) -> PersistenceResult<Vec<String>> {
        self.keys_with_status(STATUS_COMPLETED).await
    }

    async fn failed_keys(&self) -> PersistenceResult<Vec<String>> {
        self.keys_with_status(STATUS_FAILED).await
    }
}
