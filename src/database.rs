use serde_json::Value;
use thiserror::Error;

use crate::schema::{self, Table};
use crate::sql::{self, ParseError};
use crate::statement::{OnConflict, Select, Statement};
use crate::store::{KeyValueStore, MemoryStore, Record, SqliteStore, StoreError, TableStore};

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Storage error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Invalid statement: {0}")]
    ParseError(#[from] ParseError),
    #[error("{kind} cannot be run with {mode}")]
    WrongMode { kind: &'static str, mode: &'static str },
    #[error("Upsert into '{table}' is missing natural key column '{column}'")]
    MissingNaturalKey { table: Table, column: String },
    #[error("Failed to decode row of '{table}': {source}")]
    DecodeError {
        table: Table,
        #[source]
        source: serde_json::Error,
    },
}

/// A batch stopped part way through. Statements before `index` stay applied.
#[derive(Debug, Error)]
#[error("Batch failed at statement {index} after {applied} statement(s) were applied: {source}")]
pub struct BatchError {
    pub index: usize,
    pub applied: usize,
    #[source]
    pub source: DatabaseError,
}

/// Relational-style access to tables kept in a key/value store
pub struct Database {
    store: TableStore,
}

impl Database {
    /// Open the SQLite-backed store at `path` and initialize the schema
    pub fn new(path: &str) -> Result<Self, DatabaseError> {
        Self::with_store(Box::new(SqliteStore::open(path)?))
    }

    /// A database that is discarded when dropped
    pub fn in_memory() -> Result<Self, DatabaseError> {
        Self::with_store(Box::new(MemoryStore::new()))
    }

    /// Wrap any key/value backend and initialize the schema
    pub fn with_store(backend: Box<dyn KeyValueStore>) -> Result<Self, DatabaseError> {
        let mut store = TableStore::new(backend);
        schema::ensure_schema(&mut store)?;
        Ok(Database { store })
    }

    /// Run a mutating statement and return the number of rows it touched
    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize, DatabaseError> {
        let statement = sql::parse(sql, params)?;
        self.apply(&statement)
    }

    /// Run a SELECT and return the first row, if any
    pub fn fetch_one(&self, sql: &str, params: &[Value]) -> Result<Option<Record>, DatabaseError> {
        self.query_one(&Self::parse_select(sql, params, "fetch_one")?)
    }

    /// Run a SELECT and return every row
    pub fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>, DatabaseError> {
        self.query(&Self::parse_select(sql, params, "fetch_all")?)
    }

    fn parse_select(sql: &str, params: &[Value], mode: &'static str) -> Result<Select, DatabaseError> {
        match sql::parse(sql, params)? {
            Statement::Select(select) => Ok(select),
            other => Err(DatabaseError::WrongMode {
                kind: other.kind(),
                mode,
            }),
        }
    }

    pub fn query(&self, select: &Select) -> Result<Vec<Record>, DatabaseError> {
        let rows = self.store.read_table(select.table.as_str())?;
        let rows = select.evaluate(rows);
        tracing::debug!(table = %select.table, rows = rows.len(), "select");
        Ok(rows)
    }

    pub fn query_one(&self, select: &Select) -> Result<Option<Record>, DatabaseError> {
        Ok(self.query(select)?.into_iter().next())
    }

    /// Apply a mutating statement and return the number of rows it touched
    pub fn apply(&mut self, statement: &Statement) -> Result<usize, DatabaseError> {
        let affected = match statement {
            Statement::Insert {
                table,
                columns,
                values,
                on_conflict,
            } => self.insert(*table, columns, values, *on_conflict)?,
            Statement::Update {
                table,
                assignments,
                id,
            } => self.update(*table, assignments, id)?,
            Statement::Delete { table, filter } => {
                let mut rows = self.store.read_table(table.as_str())?;
                let before = rows.len();
                match filter {
                    Some(predicate) => rows.retain(|row| !predicate.matches(row)),
                    None => rows.clear(),
                }
                let removed = before - rows.len();
                if removed > 0 {
                    self.store.write_table(table.as_str(), &rows)?;
                }
                removed
            }
            Statement::Select(_) => {
                return Err(DatabaseError::WrongMode {
                    kind: "SELECT",
                    mode: "execute",
                });
            }
        };

        tracing::debug!(
            table = %statement.table(),
            kind = statement.kind(),
            affected,
            "statement applied"
        );
        Ok(affected)
    }

    fn insert(
        &mut self,
        table: Table,
        columns: &[String],
        values: &[Value],
        on_conflict: OnConflict,
    ) -> Result<usize, DatabaseError> {
        let row: Record = columns.iter().cloned().zip(values.iter().cloned()).collect();
        let mut rows = self.store.read_table(table.as_str())?;

        if on_conflict == OnConflict::Append {
            rows.push(row);
            self.store.write_table(table.as_str(), &rows)?;
            return Ok(1);
        }

        let key = table
            .natural_key()
            .iter()
            .map(|column| {
                row.get(*column)
                    .map(|value| (*column, value))
                    .ok_or_else(|| DatabaseError::MissingNaturalKey {
                        table,
                        column: column.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let existing = rows
            .iter()
            .position(|candidate| key.iter().all(|(column, value)| candidate.get(*column) == Some(*value)));

        match (existing, on_conflict) {
            (Some(_), OnConflict::Ignore) => Ok(0),
            (Some(index), _) => {
                rows[index] = row;
                self.store.write_table(table.as_str(), &rows)?;
                Ok(1)
            }
            (None, _) => {
                rows.push(row);
                self.store.write_table(table.as_str(), &rows)?;
                Ok(1)
            }
        }
    }

    fn update(
        &mut self,
        table: Table,
        assignments: &[(String, Value)],
        id: &Value,
    ) -> Result<usize, DatabaseError> {
        let mut rows = self.store.read_table(table.as_str())?;
        let Some(row) = rows.iter_mut().find(|row| row.get("id") == Some(id)) else {
            return Ok(0);
        };

        for (column, value) in assignments {
            row.insert(column.clone(), value.clone());
        }
        self.store.write_table(table.as_str(), &rows)?;
        Ok(1)
    }

    /// Apply statements in order. Not atomic: on failure, earlier statements stay applied.
    pub fn apply_batch(&mut self, statements: &[Statement]) -> Result<usize, BatchError> {
        let mut affected = 0;
        for (index, statement) in statements.iter().enumerate() {
            affected += self.apply(statement).map_err(|source| BatchError {
                index,
                applied: index,
                source,
            })?;
        }
        Ok(affected)
    }

    /// Decode rows into a typed record
    pub(crate) fn decode<T: serde::de::DeserializeOwned>(
        table: Table,
        row: Record,
    ) -> Result<T, DatabaseError> {
        serde_json::from_value(Value::Object(row))
            .map_err(|source| DatabaseError::DecodeError { table, source })
    }
}
