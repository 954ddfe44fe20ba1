//! Typed façades over [`Database`], one per entity kind.
//!
//! Each service borrows the database for as long as it is used:
//!
//! ```no_run
//! # use daybook::{Database, services::tasks::NewTask};
//! let mut db = Database::in_memory()?;
//! let task = db.tasks().create(NewTask::new("Buy milk"))?;
//! let again = db.tasks().get(&task.id)?;
//! # Ok::<(), daybook::database::DatabaseError>(())
//! ```

pub mod events;
pub mod habits;
pub mod notes;
pub mod routines;
pub mod settings;
pub mod tasks;
pub mod transfer;

use serde_json::Value;

use crate::database::{Database, DatabaseError};
use crate::schema::Table;
use crate::statement::{Predicate, Select, Statement};

impl Database {
    pub fn tasks(&mut self) -> tasks::TaskService<'_> {
        tasks::TaskService { db: self }
    }

    pub fn notes(&mut self) -> notes::NoteService<'_> {
        notes::NoteService { db: self }
    }

    pub fn events(&mut self) -> events::EventService<'_> {
        events::EventService { db: self }
    }

    pub fn habits(&mut self) -> habits::HabitService<'_> {
        habits::HabitService { db: self }
    }

    pub fn routines(&mut self) -> routines::RoutineService<'_> {
        routines::RoutineService { db: self }
    }

    pub fn settings(&mut self) -> settings::SettingsService<'_> {
        settings::SettingsService { db: self }
    }

    pub fn transfer(&mut self) -> transfer::TransferService<'_> {
        transfer::TransferService { db: self }
    }
}

/// Column assignments collected from a partial update
#[derive(Debug, Default)]
pub(crate) struct Assignments(Vec<(String, Value)>);

impl Assignments {
    pub(crate) fn set(&mut self, column: &str, value: Option<impl Into<Value>>) {
        if let Some(value) = value {
            self.0.push((column.to_string(), value.into()));
        }
    }

    pub(crate) fn push(&mut self, column: &str, value: impl Into<Value>) {
        self.0.push((column.to_string(), value.into()));
    }

    /// Apply as `UPDATE ... WHERE id = ?`. Nothing is written when there is nothing to set.
    pub(crate) fn apply(self, db: &mut Database, table: Table, id: &str) -> Result<usize, DatabaseError> {
        if self.0.is_empty() {
            return Ok(0);
        }
        db.apply(&Statement::Update {
            table,
            assignments: self.0,
            id: Value::from(id),
        })
    }
}

/// Point lookup by `id`
pub(crate) fn by_id(table: Table, id: &str) -> Select {
    Select::from(table).filter(Predicate::eq("id", id))
}

/// Delete every row whose `column` equals `value`
pub(crate) fn delete_where(
    db: &mut Database,
    table: Table,
    column: &str,
    value: &str,
) -> Result<usize, DatabaseError> {
    db.apply(&Statement::Delete {
        table,
        filter: Some(Predicate::eq(column, value)),
    })
}

/// `%query%` for a LIKE comparison
pub(crate) fn contains_pattern(query: &str) -> String {
    format!("%{}%", query)
}
