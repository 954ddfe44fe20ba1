use chrono::{Datelike, Days, Months, NaiveDate};
use serde_json::Value;

use super::{Assignments, by_id, contains_pattern, delete_where};
use crate::database::{Database, DatabaseError};
use crate::models::{Priority, Subtask, Task, TaskStatus};
use crate::schema::Table;
use crate::statement::{OnConflict, OrderBy, Predicate, Select, Statement};
use crate::store::Record;
use crate::utils;

#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub status: TaskStatus,
    pub due_date: Option<String>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Fields to change on a task. `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<Priority>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<Option<String>>,
}

/// Due-date windows used by the task list filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFilter {
    Today,
    /// Sunday through Saturday of the current week
    Week,
    Month,
}

impl DateFilter {
    /// Inclusive `due_date` bounds for the window containing `today`
    pub fn bounds(&self, today: NaiveDate) -> (String, String) {
        let (start, end) = match self {
            DateFilter::Today => (today, today),
            DateFilter::Week => {
                let start = today - Days::new(today.weekday().num_days_from_sunday() as u64);
                (start, start + Days::new(6))
            }
            DateFilter::Month => {
                let start = today - Days::new(today.day0() as u64);
                (start, start + Months::new(1) - Days::new(1))
            }
        };
        // bare dates and full timestamps on the last day both sort below this
        (
            utils::format_date(start),
            format!("{}T23:59:59.999Z", utils::format_date(end)),
        )
    }
}

pub struct TaskService<'a> {
    pub(super) db: &'a mut Database,
}

impl TaskService<'_> {
    fn list(&self, select: Select) -> Result<Vec<Task>, DatabaseError> {
        let rows = self.db.query(&select)?;
        rows.into_iter().map(|row| self.hydrate(row)).collect()
    }

    fn hydrate(&self, row: Record) -> Result<Task, DatabaseError> {
        let mut task: Task = Database::decode(Table::Tasks, row)?;
        task.subtasks = self.subtasks(&task.id)?;
        Ok(task)
    }

    /// All tasks, newest first
    pub fn all(&self) -> Result<Vec<Task>, DatabaseError> {
        self.list(Select::from(Table::Tasks).order_by(OrderBy::desc("created_at")))
    }

    pub fn get(&self, id: &str) -> Result<Option<Task>, DatabaseError> {
        self.db
            .query_one(&by_id(Table::Tasks, id))?
            .map(|row| self.hydrate(row))
            .transpose()
    }

    pub fn create(&mut self, new: NewTask) -> Result<Task, DatabaseError> {
        let now = utils::now_timestamp();
        let task = Task {
            id: utils::new_id(),
            title: new.title,
            description: new.description,
            priority: new.priority,
            status: new.status,
            due_date: new.due_date,
            created_at: now.clone(),
            updated_at: now,
            subtasks: Vec::new(),
        };

        self.db.apply(&Statement::insert(
            Table::Tasks,
            [
                ("id", Value::from(task.id.as_str())),
                ("title", Value::from(task.title.as_str())),
                ("description", Value::from(task.description.clone())),
                ("priority", Value::from(task.priority.as_str())),
                ("status", Value::from(task.status.as_str())),
                ("due_date", Value::from(task.due_date.clone())),
                ("created_at", Value::from(task.created_at.as_str())),
                ("updated_at", Value::from(task.updated_at.as_str())),
            ],
            OnConflict::Append,
        ))?;
        tracing::debug!(id = %task.id, "task created");

        Ok(task)
    }

    /// Apply `patch` and refresh `updated_at`. `None` if the task does not exist.
    pub fn update(&mut self, id: &str, patch: TaskPatch) -> Result<Option<Task>, DatabaseError> {
        let mut set = Assignments::default();
        set.set("title", patch.title);
        set.set("description", patch.description);
        set.set("priority", patch.priority.map(|p| p.as_str()));
        set.set("status", patch.status.map(|s| s.as_str()));
        set.set("due_date", patch.due_date);
        set.push("updated_at", utils::now_timestamp());
        set.apply(self.db, Table::Tasks, id)?;

        self.get(id)
    }

    /// Delete a task together with its subtasks. Returns whether the task existed.
    pub fn delete(&mut self, id: &str) -> Result<bool, DatabaseError> {
        let removed = delete_where(self.db, Table::Tasks, "id", id)?;
        delete_where(self.db, Table::Subtasks, "task_id", id)?;
        Ok(removed > 0)
    }

    /// Subtasks of a task in the order they were added
    pub fn subtasks(&self, task_id: &str) -> Result<Vec<Subtask>, DatabaseError> {
        self.db
            .query(&Select::from(Table::Subtasks).filter(Predicate::eq("task_id", task_id)))?
            .into_iter()
            .map(|row| Database::decode(Table::Subtasks, row))
            .collect()
    }

    pub fn add_subtask(&mut self, task_id: &str, title: &str) -> Result<Subtask, DatabaseError> {
        let subtask = Subtask {
            id: utils::new_id(),
            task_id: task_id.to_string(),
            title: title.to_string(),
            completed: false,
            created_at: utils::now_timestamp(),
        };

        self.db.apply(&Statement::insert(
            Table::Subtasks,
            [
                ("id", Value::from(subtask.id.as_str())),
                ("task_id", Value::from(task_id)),
                ("title", Value::from(title)),
                ("completed", Value::from(0)),
                ("created_at", Value::from(subtask.created_at.as_str())),
            ],
            OnConflict::Append,
        ))?;

        Ok(subtask)
    }

    pub fn set_subtask_completed(&mut self, id: &str, completed: bool) -> Result<bool, DatabaseError> {
        let mut set = Assignments::default();
        set.push("completed", i64::from(completed));
        Ok(set.apply(self.db, Table::Subtasks, id)? > 0)
    }

    pub fn delete_subtask(&mut self, id: &str) -> Result<bool, DatabaseError> {
        Ok(delete_where(self.db, Table::Subtasks, "id", id)? > 0)
    }

    /// Tasks due within the window containing today, soonest first
    pub fn filter_by_date(&self, filter: DateFilter) -> Result<Vec<Task>, DatabaseError> {
        self.filter_by_date_as_of(filter, utils::today())
    }

    pub fn filter_by_date_as_of(
        &self,
        filter: DateFilter,
        today: NaiveDate,
    ) -> Result<Vec<Task>, DatabaseError> {
        let (start, end) = filter.bounds(today);
        self.list(
            Select::from(Table::Tasks)
                .filter(Predicate::range("due_date", start, end))
                .order_by(OrderBy::asc("due_date")),
        )
    }

    pub fn filter_by_priority(&self, priority: Priority) -> Result<Vec<Task>, DatabaseError> {
        self.list(
            Select::from(Table::Tasks)
                .filter(Predicate::eq("priority", priority.as_str()))
                .order_by(OrderBy::desc("created_at")),
        )
    }

    pub fn filter_by_status(&self, status: TaskStatus) -> Result<Vec<Task>, DatabaseError> {
        self.list(
            Select::from(Table::Tasks)
                .filter(Predicate::eq("status", status.as_str()))
                .order_by(OrderBy::desc("created_at")),
        )
    }

    /// Case-insensitive substring search over title and description
    pub fn search(&self, query: &str) -> Result<Vec<Task>, DatabaseError> {
        let pattern = contains_pattern(query);
        self.list(
            Select::from(Table::Tasks)
                .filter(Predicate::Or(vec![
                    Predicate::like("title", pattern.as_str()),
                    Predicate::like("description", pattern.as_str()),
                ]))
                .order_by(OrderBy::desc("created_at")),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        utils::parse_date(s).unwrap()
    }

    #[test]
    fn test_week_bounds_start_on_sunday() {
        // 2024-05-15 is a Wednesday
        let (start, end) = DateFilter::Week.bounds(date("2024-05-15"));
        assert_eq!(start, "2024-05-12");
        assert_eq!(end, "2024-05-18T23:59:59.999Z");
    }

    #[test]
    fn test_month_bounds_cover_whole_month() {
        let (start, end) = DateFilter::Month.bounds(date("2024-02-10"));
        assert_eq!(start, "2024-02-01");
        assert_eq!(end, "2024-02-29T23:59:59.999Z");
    }

    #[test]
    fn test_date_filter_includes_bare_dates_and_timestamps() {
        let mut db = Database::in_memory().unwrap();
        let mut tasks = db.tasks();
        for (title, due) in [
            ("late", "2024-05-16T20:00:00.000Z"),
            ("today", "2024-05-15"),
            ("tomorrow", "2024-05-16"),
            ("next week", "2024-05-22"),
        ] {
            tasks
                .create(NewTask {
                    due_date: Some(due.to_string()),
                    ..NewTask::new(title)
                })
                .unwrap();
        }

        let today = tasks.filter_by_date_as_of(DateFilter::Today, date("2024-05-15")).unwrap();
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].title, "today");

        let week = tasks.filter_by_date_as_of(DateFilter::Week, date("2024-05-15")).unwrap();
        let titles: Vec<_> = week.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["today", "tomorrow", "late"]);
    }

    #[test]
    fn test_subtasks_follow_their_task() {
        let mut db = Database::in_memory().unwrap();
        let mut tasks = db.tasks();
        let task = tasks.create(NewTask::new("Pack")).unwrap();
        let sub = tasks.add_subtask(&task.id, "Socks").unwrap();
        assert!(tasks.set_subtask_completed(&sub.id, true).unwrap());

        let fetched = tasks.get(&task.id).unwrap().unwrap();
        assert_eq!(fetched.subtasks.len(), 1);
        assert!(fetched.subtasks[0].completed);

        assert!(tasks.delete(&task.id).unwrap());
        assert!(tasks.subtasks(&task.id).unwrap().is_empty());
        assert!(!tasks.delete(&task.id).unwrap());
    }

    #[test]
    fn test_update_missing_task_is_none() {
        let mut db = Database::in_memory().unwrap();
        let patch = TaskPatch {
            title: Some("x".to_string()),
            ..TaskPatch::default()
        };
        assert!(db.tasks().update("nope", patch).unwrap().is_none());
    }
}
