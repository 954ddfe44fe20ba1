use serde_json::Value;

use super::{Assignments, by_id, delete_where};
use crate::database::{Database, DatabaseError};
use crate::models::Routine;
use crate::schema::Table;
use crate::statement::{OnConflict, OrderBy, Select, Statement};
use crate::utils;

#[derive(Debug, Clone)]
pub struct NewRoutine {
    pub title: String,
    pub start_time: String,
    pub end_time: String,
    pub days: Vec<String>,
    pub color: String,
    pub category: String,
}

impl NewRoutine {
    pub fn new(
        title: impl Into<String>,
        start_time: impl Into<String>,
        end_time: impl Into<String>,
        days: Vec<String>,
    ) -> Self {
        Self {
            title: title.into(),
            start_time: start_time.into(),
            end_time: end_time.into(),
            days,
            color: super::events::DEFAULT_COLOR.to_string(),
            category: "personal".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoutinePatch {
    pub title: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub days: Option<Vec<String>>,
    pub color: Option<String>,
    pub category: Option<String>,
}

fn encode_days(days: &[String]) -> String {
    Value::from(days.to_vec()).to_string()
}

pub struct RoutineService<'a> {
    pub(super) db: &'a mut Database,
}

impl RoutineService<'_> {
    /// All routines by start time
    pub fn all(&self) -> Result<Vec<Routine>, DatabaseError> {
        self.db
            .query(&Select::from(Table::Routines).order_by(OrderBy::asc("start_time")))?
            .into_iter()
            .map(|row| Database::decode(Table::Routines, row))
            .collect()
    }

    pub fn get(&self, id: &str) -> Result<Option<Routine>, DatabaseError> {
        self.db
            .query_one(&by_id(Table::Routines, id))?
            .map(|row| Database::decode(Table::Routines, row))
            .transpose()
    }

    pub fn create(&mut self, new: NewRoutine) -> Result<Routine, DatabaseError> {
        let routine = Routine {
            id: utils::new_id(),
            title: new.title,
            start_time: new.start_time,
            end_time: new.end_time,
            days: new.days,
            color: new.color,
            category: new.category,
            created_at: utils::now_timestamp(),
        };

        self.db.apply(&Statement::insert(
            Table::Routines,
            [
                ("id", Value::from(routine.id.as_str())),
                ("title", Value::from(routine.title.as_str())),
                ("start_time", Value::from(routine.start_time.as_str())),
                ("end_time", Value::from(routine.end_time.as_str())),
                ("days", Value::from(encode_days(&routine.days))),
                ("color", Value::from(routine.color.as_str())),
                ("category", Value::from(routine.category.as_str())),
                ("created_at", Value::from(routine.created_at.as_str())),
            ],
            OnConflict::Append,
        ))?;

        Ok(routine)
    }

    pub fn update(&mut self, id: &str, patch: RoutinePatch) -> Result<Option<Routine>, DatabaseError> {
        let mut set = Assignments::default();
        set.set("title", patch.title);
        set.set("start_time", patch.start_time);
        set.set("end_time", patch.end_time);
        set.set("days", patch.days.as_deref().map(encode_days));
        set.set("color", patch.color);
        set.set("category", patch.category);
        set.apply(self.db, Table::Routines, id)?;

        self.get(id)
    }

    pub fn delete(&mut self, id: &str) -> Result<bool, DatabaseError> {
        Ok(delete_where(self.db, Table::Routines, "id", id)? > 0)
    }

    /// Routines scheduled on a weekday ("Monday", "Tuesday", ...)
    pub fn for_day(&self, weekday: &str) -> Result<Vec<Routine>, DatabaseError> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|routine| routine.days.iter().any(|d| d.eq_ignore_ascii_case(weekday)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn days(names: &[&str]) -> Vec<String> {
        names.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn test_for_day_and_ordering() {
        let mut db = Database::in_memory().unwrap();
        let mut routines = db.routines();
        routines
            .create(NewRoutine::new("Gym", "18:00", "19:00", days(&["Monday", "Thursday"])))
            .unwrap();
        routines
            .create(NewRoutine::new("Standup", "09:00", "09:15", days(&["Monday", "Tuesday"])))
            .unwrap();

        let monday: Vec<_> = routines
            .for_day("monday")
            .unwrap()
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(monday, ["Standup", "Gym"]);
        assert_eq!(routines.for_day("Thursday").unwrap().len(), 1);
        assert!(routines.for_day("Sunday").unwrap().is_empty());
    }

    #[test]
    fn test_update_days() {
        let mut db = Database::in_memory().unwrap();
        let mut routines = db.routines();
        let routine = routines
            .create(NewRoutine::new("Read", "21:00", "21:30", days(&["Friday"])))
            .unwrap();
        let updated = routines
            .update(
                &routine.id,
                RoutinePatch {
                    days: Some(days(&["Saturday", "Sunday"])),
                    ..RoutinePatch::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.days, ["Saturday", "Sunday"]);
    }
}
