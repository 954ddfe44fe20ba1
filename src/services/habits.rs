use chrono::{Days, NaiveDate};
use serde_json::Value;

use super::{Assignments, by_id, delete_where};
use crate::database::{Database, DatabaseError};
use crate::models::{Habit, HabitFrequency, HabitLog};
use crate::schema::Table;
use crate::statement::{OnConflict, OrderBy, Predicate, Select, Statement};
use crate::utils;

#[derive(Debug, Clone)]
pub struct NewHabit {
    pub name: String,
    pub frequency: HabitFrequency,
    pub color: String,
}

impl NewHabit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frequency: HabitFrequency::default(),
            color: super::events::DEFAULT_COLOR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HabitPatch {
    pub name: Option<String>,
    pub frequency: Option<HabitFrequency>,
    pub color: Option<String>,
}

pub struct HabitService<'a> {
    pub(super) db: &'a mut Database,
}

impl HabitService<'_> {
    /// All habits, newest first
    pub fn all(&self) -> Result<Vec<Habit>, DatabaseError> {
        self.db
            .query(&Select::from(Table::Habits).order_by(OrderBy::desc("created_at")))?
            .into_iter()
            .map(|row| Database::decode(Table::Habits, row))
            .collect()
    }

    pub fn get(&self, id: &str) -> Result<Option<Habit>, DatabaseError> {
        self.db
            .query_one(&by_id(Table::Habits, id))?
            .map(|row| Database::decode(Table::Habits, row))
            .transpose()
    }

    pub fn create(&mut self, new: NewHabit) -> Result<Habit, DatabaseError> {
        let habit = Habit {
            id: utils::new_id(),
            name: new.name,
            frequency: new.frequency,
            color: new.color,
            created_at: utils::now_timestamp(),
        };

        self.db.apply(&Statement::insert(
            Table::Habits,
            [
                ("id", Value::from(habit.id.as_str())),
                ("name", Value::from(habit.name.as_str())),
                ("frequency", Value::from(habit.frequency.as_str())),
                ("color", Value::from(habit.color.as_str())),
                ("created_at", Value::from(habit.created_at.as_str())),
            ],
            OnConflict::Append,
        ))?;

        Ok(habit)
    }

    /// Habits carry no `updated_at`, so an empty patch writes nothing
    pub fn update(&mut self, id: &str, patch: HabitPatch) -> Result<Option<Habit>, DatabaseError> {
        let mut set = Assignments::default();
        set.set("name", patch.name);
        set.set("frequency", patch.frequency.map(|f| f.as_str()));
        set.set("color", patch.color);
        set.apply(self.db, Table::Habits, id)?;

        self.get(id)
    }

    /// Delete a habit and its log
    pub fn delete(&mut self, id: &str) -> Result<bool, DatabaseError> {
        let removed = delete_where(self.db, Table::Habits, "id", id)?;
        delete_where(self.db, Table::HabitLogs, "habit_id", id)?;
        Ok(removed > 0)
    }

    /// Record whether the habit was done on `date`. Re-logging a day replaces the earlier entry.
    pub fn log(&mut self, habit_id: &str, date: &str, completed: bool) -> Result<HabitLog, DatabaseError> {
        // keep the id of an existing entry for the same day
        let id = match self.get_log(habit_id, date)? {
            Some(existing) => existing.id,
            None => utils::new_id(),
        };

        self.db.apply(&Statement::insert(
            Table::HabitLogs,
            [
                ("id", Value::from(id.as_str())),
                ("habit_id", Value::from(habit_id)),
                ("date", Value::from(date)),
                ("completed", Value::from(i64::from(completed))),
            ],
            OnConflict::Replace,
        ))?;

        Ok(HabitLog {
            id,
            habit_id: habit_id.to_string(),
            date: date.to_string(),
            completed,
        })
    }

    pub fn get_log(&self, habit_id: &str, date: &str) -> Result<Option<HabitLog>, DatabaseError> {
        let select = Select::from(Table::HabitLogs).filter(Predicate::And(vec![
            Predicate::eq("habit_id", habit_id),
            Predicate::eq("date", date),
        ]));
        self.db
            .query_one(&select)?
            .map(|row| Database::decode(Table::HabitLogs, row))
            .transpose()
    }

    /// Log entries between two dates (inclusive), newest first
    pub fn logs(&self, habit_id: &str, start: &str, end: &str) -> Result<Vec<HabitLog>, DatabaseError> {
        let select = Select::from(Table::HabitLogs)
            .filter(Predicate::And(vec![
                Predicate::eq("habit_id", habit_id),
                Predicate::range("date", start, end),
            ]))
            .order_by(OrderBy::desc("date"));
        self.db
            .query(&select)?
            .into_iter()
            .map(|row| Database::decode(Table::HabitLogs, row))
            .collect()
    }

    /// Consecutive completed days ending today
    pub fn streak(&self, habit_id: &str) -> Result<u32, DatabaseError> {
        self.streak_as_of(habit_id, utils::today())
    }

    /// Consecutive completed days ending at `day`. A missing or incomplete day ends the streak.
    pub fn streak_as_of(&self, habit_id: &str, day: NaiveDate) -> Result<u32, DatabaseError> {
        let mut streak = 0;
        let mut current = Some(day);

        while let Some(date) = current {
            match self.get_log(habit_id, &utils::format_date(date))? {
                Some(log) if log.completed => streak += 1,
                _ => break,
            }
            current = date.checked_sub_days(Days::new(1));
        }

        Ok(streak)
    }

    /// Percentage of the last `days` days marked completed
    pub fn success_rate(&self, habit_id: &str, days: u32) -> Result<u32, DatabaseError> {
        self.success_rate_as_of(habit_id, days, utils::today())
    }

    pub fn success_rate_as_of(
        &self,
        habit_id: &str,
        days: u32,
        today: NaiveDate,
    ) -> Result<u32, DatabaseError> {
        if days == 0 {
            return Ok(0);
        }
        // windows reaching past the earliest representable date start there
        let start = today
            .checked_sub_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MIN);
        let logs = self.logs(
            habit_id,
            &utils::format_date(start),
            &utils::format_date(today),
        )?;
        if logs.is_empty() {
            return Ok(0);
        }

        let completed = logs.iter().filter(|log| log.completed).count();
        Ok((completed as f64 / f64::from(days) * 100.0).round() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        utils::parse_date(s).unwrap()
    }

    #[test]
    fn test_relogging_a_day_keeps_one_entry() {
        let mut db = Database::in_memory().unwrap();
        let mut habits = db.habits();
        let habit = habits.create(NewHabit::new("Read")).unwrap();

        let first = habits.log(&habit.id, "2024-01-01", true).unwrap();
        let second = habits.log(&habit.id, "2024-01-01", false).unwrap();
        assert_eq!(first.id, second.id);

        let logs = habits.logs(&habit.id, "2024-01-01", "2024-01-01").unwrap();
        assert_eq!(logs.len(), 1);
        assert!(!logs[0].completed);
    }

    #[test]
    fn test_streak_stops_at_gap() {
        let mut db = Database::in_memory().unwrap();
        let mut habits = db.habits();
        let habit = habits.create(NewHabit::new("Run")).unwrap();
        for day in ["2024-01-10", "2024-01-09", "2024-01-07", "2024-01-06"] {
            habits.log(&habit.id, day, true).unwrap();
        }
        assert_eq!(habits.streak_as_of(&habit.id, date("2024-01-10")).unwrap(), 2);
        assert_eq!(habits.streak_as_of(&habit.id, date("2024-01-08")).unwrap(), 0);
    }

    #[test]
    fn test_success_rate() {
        let mut db = Database::in_memory().unwrap();
        let mut habits = db.habits();
        let habit = habits.create(NewHabit::new("Stretch")).unwrap();
        assert_eq!(habits.success_rate_as_of(&habit.id, 10, date("2024-01-10")).unwrap(), 0);

        for day in ["2024-01-10", "2024-01-09", "2024-01-08"] {
            habits.log(&habit.id, day, true).unwrap();
        }
        habits.log(&habit.id, "2024-01-07", false).unwrap();
        assert_eq!(habits.success_rate_as_of(&habit.id, 10, date("2024-01-10")).unwrap(), 30);
    }

    #[test]
    fn test_success_rate_over_huge_window() {
        let mut db = Database::in_memory().unwrap();
        let mut habits = db.habits();
        let habit = habits.create(NewHabit::new("Journal")).unwrap();
        assert_eq!(habits.success_rate_as_of(&habit.id, u32::MAX, date("2024-01-10")).unwrap(), 0);

        habits.log(&habit.id, "2024-01-10", true).unwrap();
        assert_eq!(habits.success_rate_as_of(&habit.id, u32::MAX, date("2024-01-10")).unwrap(), 0);
        assert_eq!(habits.success_rate(&habit.id, u32::MAX).unwrap(), 0);
    }

    #[test]
    fn test_delete_removes_logs() {
        let mut db = Database::in_memory().unwrap();
        let mut habits = db.habits();
        let habit = habits.create(NewHabit::new("Meditate")).unwrap();
        habits.log(&habit.id, "2024-01-01", true).unwrap();

        assert!(habits.delete(&habit.id).unwrap());
        assert!(habits.get_log(&habit.id, "2024-01-01").unwrap().is_none());
    }
}
