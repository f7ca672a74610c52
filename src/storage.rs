//! Durable key-value storage shared by both contexts.
//! Values are JSON; SQLite is the persistent backend, `MemoryStore` backs tests.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::StorageError;

/// Persisted `{word: translation}` map of the process-resident cache.
pub const TRANSLATION_CACHE_KEY: &str = "translationCache";

pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;
    fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    fn get_bool(&self, key: &str, default: bool) -> Result<bool, StorageError> {
        Ok(self.get(key)?.and_then(|v| v.as_bool()).unwrap_or(default))
    }

    /// Empty strings count as unset.
    fn get_string(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .get(key)?
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.trim().is_empty()))
    }
}

/// SQLite-backed store: one row per key, JSON text values.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at the given path.
    pub fn open(db_path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init(conn).inspect(|_| info!(path = %db_path.display(), "kv store opened"))
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KvStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let conn = self.conn.lock();
        let raw: Option<String> = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        raw.map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(StorageError::from)
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let text = serde_json::to_string(&value)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, text, now_unix()],
        )?;
        debug!(key, bytes = text.len(), "kv set");
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }
}

/// Current time as Unix timestamp (seconds).
fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.set(TRANSLATION_CACHE_KEY, json!({"cat": "猫"})).unwrap();
            store.set("enableExtension", json!(false)).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get(TRANSLATION_CACHE_KEY).unwrap(), Some(json!({"cat": "猫"})));
        assert!(!store.get_bool("enableExtension", true).unwrap());
    }

    #[test]
    fn later_write_wins() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("k", json!({"a": "1"})).unwrap();
        store.set("k", json!({"a": "1", "b": "2"})).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(json!({"a": "1", "b": "2"})));
    }

    #[test]
    fn typed_helpers_apply_defaults() {
        let store = MemoryStore::new();
        assert!(store.get_bool("enableExtension", true).unwrap());
        store.set("apiKey", json!("  ")).unwrap();
        assert_eq!(store.get_string("apiKey").unwrap(), None);
        store.set("apiKey", json!("secret")).unwrap();
        assert_eq!(store.get_string("apiKey").unwrap().as_deref(), Some("secret"));
    }
}
