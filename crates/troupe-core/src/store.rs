//! History persistence boundary.
//!
//! The engine holds no durable state: the host loads a prior history
//! before a run and persists the result afterward (load-modify-save).
//! `HistoryStore` is that boundary; the SQLite implementation uses
//! rusqlite behind `spawn_blocking` so database work never blocks the
//! async runtime.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use tokio::sync::RwLock;

use crate::error::TeamError;
use crate::history::ChatHistory;

/// Keyed load/save access to conversation histories.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<ChatHistory>, TeamError>;
    async fn save(&self, key: &str, history: &ChatHistory) -> Result<(), TeamError>;
}

/// In-memory store for tests and ephemeral hosts.
#[derive(Default)]
pub struct MemoryHistoryStore {
    histories: RwLock<HashMap<String, ChatHistory>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn load(&self, key: &str) -> Result<Option<ChatHistory>, TeamError> {
        Ok(self.histories.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, history: &ChatHistory) -> Result<(), TeamError> {
        self.histories
            .write()
            .await
            .insert(key.to_string(), history.clone());
        Ok(())
    }
}

/// Thread-safe handle to the SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(db_path: &str) -> Result<Self, TeamError> {
        let path = Path::new(db_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let conn = Connection::open(db_path)
            .map_err(|e| TeamError::Database(format!("Failed to open database: {}", e)))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| TeamError::Database(format!("Failed to set pragmas: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_tables()?;

        tracing::info!("SQLite database opened at: {}", db_path);
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, TeamError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| TeamError::Database(format!("Failed to open in-memory db: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_tables()?;
        Ok(db)
    }

    /// Execute a closure with access to the database connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, TeamError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| TeamError::Database(format!("Lock poisoned: {}", e)))?;
        f(&conn).map_err(|e| TeamError::Database(e.to_string()))
    }

    /// Execute a closure with access to the database connection
    /// (async-friendly).
    pub async fn with_conn_async<F, T>(&self, f: F) -> Result<T, TeamError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.with_conn(f))
            .await
            .map_err(|e| TeamError::Database(format!("Task join error: {}", e)))?
    }

    fn initialize_tables(&self) -> Result<(), TeamError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "
                CREATE TABLE IF NOT EXISTS conversations (
                    id          TEXT PRIMARY KEY,
                    history     TEXT NOT NULL DEFAULT '[]',
                    updated_at  INTEGER NOT NULL
                );
                ",
            )
        })
    }
}

/// SQLite-backed history store; one row per conversation key, the
/// message sequence stored as JSON.
#[derive(Clone)]
pub struct SqliteHistoryStore {
    db: Database,
}

impl SqliteHistoryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn load(&self, key: &str) -> Result<Option<ChatHistory>, TeamError> {
        let id = key.to_string();
        let raw: Option<String> = self
            .db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare("SELECT history FROM conversations WHERE id = ?1")?;
                stmt.query_row(rusqlite::params![id], |row| row.get(0))
                    .optional()
            })
            .await?;

        match raw {
            Some(json) => {
                let history = serde_json::from_str(&json)
                    .map_err(|e| TeamError::Database(format!("Corrupt history row: {}", e)))?;
                Ok(Some(history))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, key: &str, history: &ChatHistory) -> Result<(), TeamError> {
        let id = key.to_string();
        let json = serde_json::to_string(history)
            .map_err(|e| TeamError::Database(format!("Failed to serialize history: {}", e)))?;

        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO conversations (id, history, updated_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(id) DO UPDATE SET
                       history = excluded.history,
                       updated_at = excluded.updated_at",
                    rusqlite::params![id, json, Utc::now().timestamp_millis()],
                )?;
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Message;

    fn sample_history() -> ChatHistory {
        let mut history = ChatHistory::new();
        history.push(Message::user("caller", "process order 7"));
        history.push(Message::assistant("validator", "Valid order"));
        history
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryHistoryStore::new();
        assert!(store.load("conv-1").await.unwrap().is_none());

        let history = sample_history();
        store.save("conv-1", &history).await.unwrap();
        assert_eq!(store.load("conv-1").await.unwrap().unwrap(), history);
    }

    #[tokio::test]
    async fn test_file_backed_database_persists_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("troupe.db");
        let path = path.to_string_lossy().to_string();

        let store = SqliteHistoryStore::new(Database::open(&path).unwrap());
        store.save("conv-1", &sample_history()).await.unwrap();
        drop(store);

        let reopened = SqliteHistoryStore::new(Database::open(&path).unwrap());
        let loaded = reopened.load("conv-1").await.unwrap().unwrap();
        assert_eq!(loaded, sample_history());
    }

    #[tokio::test]
    async fn test_sqlite_store_round_trip_and_upsert() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteHistoryStore::new(db);

        let mut history = sample_history();
        store.save("order-7", &history).await.unwrap();
        assert_eq!(store.load("order-7").await.unwrap().unwrap(), history);

        history.push(Message::assistant("pricer", "total 12.50"));
        store.save("order-7", &history).await.unwrap();

        let loaded = store.load("order-7").await.unwrap().unwrap();
        assert_eq!(loaded.len(), 3);
        assert!(store.load("order-8").await.unwrap().is_none());
    }
}
