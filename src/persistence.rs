//! Durable key/value store backing blocks, block info and state trie nodes

use crate::error::ChainError;
use parking_lot::RwLock;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Key under which the last known total difficulty is kept.
pub const LAST_KNOWN_TD_KEY: &[u8] = b"LastKnownTotalDifficulty";

/// Abstraction for durable storage backends. Writes are independent; callers
/// that need several writes to land together get no such guarantee here.
pub trait Database: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError>;
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), ChainError>;

    /// Big-endian total difficulty, empty if none has been recorded.
    fn last_known_total_difficulty(&self) -> Result<Vec<u8>, ChainError> {
        Ok(self.get(LAST_KNOWN_TD_KEY)?.unwrap_or_default())
    }
}

pub type SharedDatabase = Arc<dyn Database>;

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    pub fn open(path: &str) -> Result<Self, ChainError> {
        let conn = Connection::open(path)
            .map_err(|e| ChainError::DatabaseError(format!("Failed to open database: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key BLOB PRIMARY KEY,
                value BLOB NOT NULL
            )",
            [],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to create kv table: {}", e)))?;

        Ok(SqliteDatabase {
            conn: Mutex::new(conn),
        })
    }
}

impl Database for SqliteDatabase {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;
        conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
            row.get(0)
        })
        .optional()
        .map_err(|e| ChainError::DatabaseError(format!("Failed to read key: {}", e)))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), ChainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to write key: {}", e)))?;
        Ok(())
    }
}

/// Simple in-memory store useful for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryDatabase {
    entries: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedDatabase {
        Arc::new(Self::new())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Database for MemoryDatabase {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), ChainError> {
        self.entries.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(db: &dyn Database) {
        assert_eq!(db.get(b"missing").unwrap(), None);
        db.put(b"key", b"value").unwrap();
        assert_eq!(db.get(b"key").unwrap(), Some(b"value".to_vec()));
        db.put(b"key", b"other").unwrap();
        assert_eq!(db.get(b"key").unwrap(), Some(b"other".to_vec()));

        assert!(db.last_known_total_difficulty().unwrap().is_empty());
        db.put(LAST_KNOWN_TD_KEY, &[0x04, 0x00]).unwrap();
        assert_eq!(db.last_known_total_difficulty().unwrap(), vec![0x04, 0x00]);
    }

    #[test]
    fn test_memory_database() {
        let db = MemoryDatabase::new();
        exercise(&db);
        assert_eq!(db.len(), 2);
    }

    #[test]
    fn test_sqlite_database_in_memory() {
        let db = SqliteDatabase::open(":memory:").unwrap();
        exercise(&db);
    }

    #[test]
    fn test_sqlite_database_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ledger.db");
        let path = path.to_str().unwrap();

        SqliteDatabase::open(path).unwrap().put(b"block", b"payload").unwrap();
        let reopened = SqliteDatabase::open(path).unwrap();
        assert_eq!(reopened.get(b"block").unwrap(), Some(b"payload".to_vec()));
    }
}
