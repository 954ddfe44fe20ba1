use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::store::{Record, StoreError, TableStore};

/// The logical tables of the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Tasks,
    Subtasks,
    Notes,
    Events,
    Habits,
    HabitLogs,
    Routines,
    Settings,
}

impl Table {
    pub const ALL: [Table; 8] = [
        Table::Tasks,
        Table::Subtasks,
        Table::Notes,
        Table::Events,
        Table::Habits,
        Table::HabitLogs,
        Table::Routines,
        Table::Settings,
    ];

    /// Storage key and SQL name of the table
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Tasks => "tasks",
            Table::Subtasks => "subtasks",
            Table::Notes => "notes",
            Table::Events => "events",
            Table::Habits => "habits",
            Table::HabitLogs => "habit_logs",
            Table::Routines => "routines",
            Table::Settings => "settings",
        }
    }

    /// Columns that identify an existing row during INSERT OR REPLACE / OR IGNORE
    pub fn natural_key(&self) -> &'static [&'static str] {
        match self {
            Table::Settings => &["key"],
            Table::HabitLogs => &["habit_id", "date"],
            _ => &["id"],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown table '{0}'")]
pub struct UnknownTable(pub String);

impl FromStr for Table {
    type Err = UnknownTable;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownTable(s.to_string()))
    }
}

/// Rows written to `settings` the first time it is found empty
pub fn default_settings() -> Vec<Record> {
    [("theme", "light"), ("colorScheme", "blue")]
        .into_iter()
        .map(|(key, value)| {
            let mut row = Record::new();
            row.insert("key".to_string(), Value::from(key));
            row.insert("value".to_string(), Value::from(value));
            row
        })
        .collect()
}

/// Create every missing table and seed default settings. Safe to call repeatedly.
pub fn ensure_schema(store: &mut TableStore) -> Result<(), StoreError> {
    for table in Table::ALL {
        if !store.has_table(table.as_str())? {
            tracing::debug!(table = %table, "creating empty table");
            store.write_table(table.as_str(), &[])?;
        }
    }

    if store.read_table(Table::Settings.as_str())?.is_empty() {
        tracing::info!("seeding default settings");
        store.write_table(Table::Settings.as_str(), &default_settings())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_table_names_round_trip() {
        for table in Table::ALL {
            assert_eq!(table.as_str().parse::<Table>().unwrap(), table);
        }
        assert_eq!("HABIT_LOGS".parse::<Table>().unwrap(), Table::HabitLogs);
        let err = "journals".parse::<Table>().unwrap_err();
        assert_eq!(err, UnknownTable("journals".to_string()));
        assert_eq!(err.to_string(), "unknown table 'journals'");
    }

    #[test]
    fn test_natural_keys() {
        assert_eq!(Table::Settings.natural_key(), &["key"]);
        assert_eq!(Table::HabitLogs.natural_key(), &["habit_id", "date"]);
        assert_eq!(Table::Notes.natural_key(), &["id"]);
    }

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let mut store = TableStore::new(Box::new(MemoryStore::new()));
        ensure_schema(&mut store).unwrap();
        ensure_schema(&mut store).unwrap();

        for table in Table::ALL {
            assert!(store.has_table(table.as_str()).unwrap());
        }
        let settings = store.read_table("settings").unwrap();
        assert_eq!(settings, default_settings());
    }

    #[test]
    fn test_ensure_schema_keeps_existing_rows() {
        let mut store = TableStore::new(Box::new(MemoryStore::new()));
        let mut row = Record::new();
        row.insert("id".to_string(), Value::from("t1"));
        store.write_table("tasks", &[row.clone()]).unwrap();

        ensure_schema(&mut store).unwrap();
        assert_eq!(store.read_table("tasks").unwrap(), vec![row]);
    }
}
