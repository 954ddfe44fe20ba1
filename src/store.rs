use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// A single untyped row of a table
pub type Record = serde_json::Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create storage directory: {0}")]
    DirectoryError(String),
    #[error("Stored table '{table}' is not a JSON array of records: {reason}")]
    Corrupt { table: String, reason: String },
    #[error("Failed to serialize table '{table}': {source}")]
    Serialize {
        table: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Host key/value storage. One key holds one serialized table.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-process store, used for tests and throwaway sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Key/value storage backed by a single SQLite file
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the store file, creating its parent directory if needed
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let db_path = PathBuf::from(path);

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::DirectoryError(e.to_string()))?;
            }
        }

        let conn = Connection::open(&db_path)?;
        Self::with_connection(conn)
    }

    /// Open a store that lives only as long as this value
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key             TEXT PRIMARY KEY,
                value           TEXT NOT NULL
            )",
            [],
        )?;
        Ok(SqliteStore { conn })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )?;
        tx.commit()?;
        Ok(())
    }
}

/// Reads and writes whole tables as JSON arrays on top of a [`KeyValueStore`]
pub struct TableStore {
    backend: Box<dyn KeyValueStore>,
}

impl TableStore {
    pub fn new(backend: Box<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Whether the table has ever been written
    pub fn has_table(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.backend.get(name)?.is_some())
    }

    /// Read every record of a table. A table that was never written is empty.
    pub fn read_table(&self, name: &str) -> Result<Vec<Record>, StoreError> {
        let Some(raw) = self.backend.get(name)? else {
            return Ok(Vec::new());
        };

        let rows: Vec<Value> = serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
            table: name.to_string(),
            reason: e.to_string(),
        })?;

        rows.into_iter()
            .enumerate()
            .map(|(i, row)| match row {
                Value::Object(record) => Ok(record),
                other => Err(StoreError::Corrupt {
                    table: name.to_string(),
                    reason: format!("row {} is {} rather than an object", i, json_kind(&other)),
                }),
            })
            .collect()
    }

    /// Replace the stored contents of a table
    pub fn write_table(&mut self, name: &str, records: &[Record]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(records).map_err(|source| StoreError::Serialize {
            table: name.to_string(),
            source,
        })?;
        self.backend.set(name, &raw)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_missing_table_reads_empty() {
        let store = TableStore::new(Box::new(MemoryStore::new()));
        assert!(store.read_table("tasks").unwrap().is_empty());
        assert!(!store.has_table("tasks").unwrap());
    }

    #[test]
    fn test_round_trip_preserves_values() {
        let mut store = TableStore::new(Box::new(MemoryStore::new()));
        let rows = vec![
            record(json!({"id": "a", "completed": 1, "ratio": 0.5, "tags": "[\"x\",\"y\"]"})),
            record(json!({"id": "b", "completed": 0, "description": null})),
        ];
        store.write_table("subtasks", &rows).unwrap();
        assert_eq!(store.read_table("subtasks").unwrap(), rows);
        assert!(store.has_table("subtasks").unwrap());
    }

    #[test]
    fn test_sqlite_round_trip_and_overwrite() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("daybook.db");
        let mut store = TableStore::new(Box::new(
            SqliteStore::open(path.to_str().unwrap()).unwrap(),
        ));

        store.write_table("notes", &[record(json!({"id": "1"}))]).unwrap();
        store.write_table("notes", &[record(json!({"id": "2"}))]).unwrap();

        let rows = store.read_table("notes").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!("2"));
    }

    #[test]
    fn test_corrupt_table_is_an_error() {
        let mut backend = MemoryStore::new();
        backend.set("tasks", "[1, 2]").unwrap();
        let store = TableStore::new(Box::new(backend));
        assert!(matches!(
            store.read_table("tasks"),
            Err(StoreError::Corrupt { .. })
        ));
    }
}
