//! Whole-dataset export and destructive import.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::database::{BatchError, Database, DatabaseError};
use crate::schema::Table;
use crate::statement::{OnConflict, Select, Statement};
use crate::store::Record;
use crate::utils;

pub const EXPORT_VERSION: &str = "1.0.0";

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Invalid import document: {0}")]
    InvalidDocument(String),
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
    #[error("Import stopped part way: {0}")]
    BatchError(#[from] BatchError),
    #[error("Failed to serialize export: {0}")]
    SerializeError(#[source] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub export_date: String,
    pub data: ExportData,
}

/// Table contents keyed as in the export file. A missing key means "nothing to restore".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtasks: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub habits: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub habit_logs: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routines: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Vec<Record>>,
}

impl ExportData {
    fn slot(&mut self, table: Table) -> &mut Option<Vec<Record>> {
        match table {
            Table::Tasks => &mut self.tasks,
            Table::Subtasks => &mut self.subtasks,
            Table::Notes => &mut self.notes,
            Table::Events => &mut self.events,
            Table::Habits => &mut self.habits,
            Table::HabitLogs => &mut self.habit_logs,
            Table::Routines => &mut self.routines,
            Table::Settings => &mut self.settings,
        }
    }

    /// Rows for a table, if the document carries that table
    pub fn rows(&self, table: Table) -> Option<&[Record]> {
        let rows = match table {
            Table::Tasks => &self.tasks,
            Table::Subtasks => &self.subtasks,
            Table::Notes => &self.notes,
            Table::Events => &self.events,
            Table::Habits => &self.habits,
            Table::HabitLogs => &self.habit_logs,
            Table::Routines => &self.routines,
            Table::Settings => &self.settings,
        };
        rows.as_deref()
    }
}

pub struct TransferService<'a> {
    pub(super) db: &'a mut Database,
}

impl TransferService<'_> {
    /// Snapshot every table, unfiltered and unmodified
    pub fn export(&self) -> Result<ExportDocument, DatabaseError> {
        let mut data = ExportData::default();
        for table in Table::ALL {
            *data.slot(table) = Some(self.db.query(&Select::from(table))?);
        }
        tracing::info!("exported all tables");

        Ok(ExportDocument {
            version: EXPORT_VERSION.to_string(),
            export_date: utils::now_timestamp(),
            data,
        })
    }

    pub fn export_json(&self) -> Result<String, TransferError> {
        let document = self.export()?;
        serde_json::to_string_pretty(&document).map_err(TransferError::SerializeError)
    }

    /// Replace the stored data with the contents of an export document.
    ///
    /// The document is fully parsed and validated before anything is deleted.
    /// Data tables are cleared and refilled verbatim; settings rows are upserted by key.
    /// Returns the number of rows restored.
    pub fn import_json(&mut self, json: &str) -> Result<usize, TransferError> {
        let document: ExportDocument = serde_json::from_str(json)
            .map_err(|e| TransferError::InvalidDocument(e.to_string()))?;
        self.import(&document)
    }

    pub fn import(&mut self, document: &ExportDocument) -> Result<usize, TransferError> {
        if !document.version.is_empty() && !document.version.starts_with("1.") {
            tracing::warn!(version = %document.version, "importing document from another format version");
        }

        let statements = import_statements(&document.data)?;
        let restored = statements
            .iter()
            .filter(|statement| matches!(statement, Statement::Insert { .. }))
            .count();
        self.db.apply_batch(&statements)?;
        tracing::info!(rows = restored, "import complete");
        Ok(restored)
    }
}

/// Build every statement an import will run, so that a bad document fails before any delete
fn import_statements(data: &ExportData) -> Result<Vec<Statement>, TransferError> {
    let mut statements: Vec<Statement> = Table::ALL
        .into_iter()
        .filter(|table| *table != Table::Settings)
        .map(|table| Statement::Delete {
            table,
            filter: None,
        })
        .collect();

    for table in Table::ALL {
        let Some(rows) = data.rows(table) else {
            continue;
        };

        let on_conflict = if table == Table::Settings {
            OnConflict::Replace
        } else {
            OnConflict::Append
        };

        for (i, row) in rows.iter().enumerate() {
            if let Some(column) = table.natural_key().iter().find(|c| !row.contains_key(**c)) {
                return Err(TransferError::InvalidDocument(format!(
                    "{} row {} has no '{}'",
                    table, i, column
                )));
            }
            statements.push(Statement::insert_record(table, row, on_conflict));
        }
    }

    Ok(statements)
}
