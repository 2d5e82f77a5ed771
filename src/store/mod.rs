//! Document persistence
//!
//! This module provides:
//! - The [`DocumentStore`] trait the scheduler persists through
//! - [`SqliteStore`], a single-table SQLite store with per-operation timeouts
//! - [`MemoryStore`], an in-process store for tests and embedding hosts

mod memory;
mod schema;

pub use memory::*;
pub use schema::*;

use crate::config::Config;
use crate::document::Document;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Durable collection of documents keyed by id
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every stored document, in insertion order
    async fn get_all(&self) -> Result<Vec<Document>>;

    /// Insert or overwrite the record with the same id
    async fn upsert(&self, document: &Document) -> Result<()>;

    /// Remove a document. Removing an unknown id is not an error.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Remove every document
    async fn clear(&self) -> Result<()>;
}

/// SQLite-backed document store.
///
/// The pool is opened on first use. If an operation fails or exceeds the
/// configured timeout, the pool is dropped and the next operation reopens it.
pub struct SqliteStore {
    db_path: PathBuf,
    timeout: Duration,
    handle: Mutex<Option<SqlitePool>>,
}

impl SqliteStore {
    pub fn new(db_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            db_path: db_path.into(),
            timeout,
            handle: Mutex::new(None),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.paths.db_file.clone(), config.store.timeout())
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Drop the connection pool. The next operation reopens it.
    pub async fn close(&self) {
        if let Some(pool) = self.handle.lock().await.take() {
            pool.close().await;
            debug!("Closed SQLite database at {:?}", self.db_path);
        }
    }

    async fn connect(db_path: &Path) -> Result<SqlitePool> {
        // Create parent directory if needed
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;
        Ok(pool)
    }

    async fn pool(&self) -> Result<SqlitePool> {
        let mut handle = self.handle.lock().await;
        if let Some(pool) = handle.as_ref() {
            return Ok(pool.clone());
        }
        let pool = Self::connect(&self.db_path).await?;
        info!("Opened document store at {:?}", self.db_path);
        *handle = Some(pool.clone());
        Ok(pool)
    }

    /// Run one operation under the store timeout. Any failure resets the handle.
    async fn run<T, F, Fut>(&self, operation: &str, f: F) -> Result<T>
    where
        F: FnOnce(SqlitePool) -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let attempt = async {
            let pool = self.pool().await?;
            f(pool).await
        };

        let outcome = match tokio::time::timeout(self.timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(Error::Storage(format!(
                "{} timed out after {:?}",
                operation, self.timeout
            ))),
        };

        match outcome {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!("Store {} failed, resetting connection: {}", operation, e);
                self.handle.lock().await.take();
                Err(match e {
                    Error::Storage(_) => e,
                    other => Error::Storage(format!("{} failed: {}", operation, other)),
                })
            }
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get_all(&self) -> Result<Vec<Document>> {
        self.run("get_all", |pool| async move {
            let rows: Vec<(String,)> =
                sqlx::query_as("SELECT data_json FROM documents ORDER BY rowid")
                    .fetch_all(&pool)
                    .await?;
            rows.into_iter()
                .map(|(json,)| serde_json::from_str::<Document>(&json).map_err(Error::from))
                .collect()
        })
        .await
    }

    async fn upsert(&self, document: &Document) -> Result<()> {
        let data_json = serde_json::to_string(document)?;
        let id = document.id.clone();
        self.run("upsert", |pool| async move {
            let now = Utc::now().to_rfc3339();
            sqlx::query(
                r#"
                INSERT INTO documents (id, data_json, created_at, updated_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    data_json = excluded.data_json,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&id)
            .bind(&data_json)
            .bind(&now)
            .bind(&now)
            .execute(&pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.run("delete", |pool| async move {
            sqlx::query("DELETE FROM documents WHERE id = ?")
                .bind(&id)
                .execute(&pool)
                .await?;
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        self.run("clear", |pool| async move {
            sqlx::query("DELETE FROM documents").execute(&pool).await?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_store() -> (SqliteStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::new(tmp.path().join("test.db"), Duration::from_secs(10));
        (store, tmp)
    }

    #[tokio::test]
    async fn test_document_crud() {
        let (store, _tmp) = setup_test_store();

        let mut doc = Document::new("brief.txt", "text/plain", "The court held.".to_string());
        store.upsert(&doc).await.unwrap();

        let loaded = store.get_all().await.unwrap();
        assert_eq!(loaded, vec![doc.clone()]);

        // Overwrite keyed by id
        doc.is_processed = true;
        store.upsert(&doc).await.unwrap();
        let loaded = store.get_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].is_processed);

        store.delete(&doc.id).await.unwrap();
        assert!(store.get_all().await.unwrap().is_empty());

        // Unknown ids are fine
        store.delete("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_get_all_keeps_insertion_order() {
        let (store, _tmp) = setup_test_store();

        let docs: Vec<_> = ["c.txt", "a.txt", "b.txt"]
            .iter()
            .map(|name| Document::new(*name, "text/plain", format!("body of {}", name)))
            .collect();
        for doc in &docs {
            store.upsert(doc).await.unwrap();
        }
        // Updating the first one must not move it
        store.upsert(&docs[0]).await.unwrap();

        let names: Vec<_> = store
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["c.txt", "a.txt", "b.txt"]);

        store.clear().await.unwrap();
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reopens_after_close() {
        let (store, _tmp) = setup_test_store();

        let doc = Document::unreadable("scan.pdf", "application/pdf", "corrupt xref".to_string());
        store.upsert(&doc).await.unwrap();
        store.close().await;

        let loaded = store.get_all().await.unwrap();
        assert_eq!(loaded, vec![doc]);
    }

    #[tokio::test]
    async fn test_failed_operation_reopens_handle() {
        let (store, _tmp) = setup_test_store();
        let doc = Document::new("brief.txt", "text/plain", "The court held.".to_string());
        store.upsert(&doc).await.unwrap();

        // A row that does not decode makes get_all fail on an open pool
        let pool = store.pool().await.unwrap();
        sqlx::query(
            "INSERT INTO documents (id, data_json, created_at, updated_at) VALUES ('bad', 'not json', '', '')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let err = store.get_all().await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert!(store.handle.lock().await.is_none());

        // The next operations reopen the store and succeed
        store.delete("bad").await.unwrap();
        assert!(store.handle.lock().await.is_some());
        assert_eq!(store.get_all().await.unwrap(), vec![doc.clone()]);

        let mut updated = doc.clone();
        updated.is_processed = true;
        store.upsert(&updated).await.unwrap();
        assert_eq!(store.get_all().await.unwrap(), vec![updated]);
    }

    #[tokio::test]
    async fn test_timed_out_operation_reopens_handle() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::new(tmp.path().join("test.db"), Duration::from_secs(5));
        store.get_all().await.unwrap();

        // Hold the write lock from a second pool so the upsert cannot finish in time
        let blocker = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(store.path())
                    .busy_timeout(Duration::from_secs(30)),
            )
            .await
            .unwrap();
        let mut tx = blocker.begin().await.unwrap();
        sqlx::query("DELETE FROM documents").execute(&mut *tx).await.unwrap();

        let slow = SqliteStore::new(store.path(), Duration::from_millis(200));
        let doc = Document::new("brief.txt", "text/plain", "The court held.".to_string());
        let err = slow.upsert(&doc).await.unwrap_err();
        assert!(err.to_string().contains("upsert"));
        assert!(slow.handle.lock().await.is_none());

        tx.rollback().await.unwrap();
        blocker.close().await;

        slow.upsert(&doc).await.unwrap();
        assert_eq!(slow.get_all().await.unwrap(), vec![doc]);
    }

    #[tokio::test]
    async fn test_failure_is_storage_error() {
        let tmp = TempDir::new().unwrap();
        // A directory cannot be opened as a database file
        let store = SqliteStore::new(tmp.path(), Duration::from_secs(10));

        let err = store.get_all().await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }
}
